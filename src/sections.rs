//! Static informational sections and the result view.

use teloxide::utils::html;

use crate::backend::StoredAssessment;
use crate::quiz::{classifier::PrakritiResult, Dosha};

pub const ABOUT_TEXT: &str = "<b>About Prakriti</b>\n\n\
In Ayurveda, Prakriti is the constitution you are born with: the balance of the three doshas, \
Vata, Pitta and Kapha, that shapes your body, digestion, sleep and temperament.\n\n\
Knowing your Prakriti helps you choose food, routines and exercise that keep you in balance.";

pub const FEATURES_TEXT: &str = "<b>What you can do here</b>\n\n\
• Take a 12 question Prakriti self-assessment (/quiz)\n\
• See your dosha distribution with lifestyle suggestions\n\
• Save your results to your account and view them later (/myresult)\n\
• Book a consultation with one of our practitioners (/book)";

pub const FOOTER_TEXT: &str = "This assessment is for general wellness guidance only and is not a medical diagnosis.";

pub const CTA_TEXT: &str = "Want a personal plan? Book a consultation with /book.";

const BAR_WIDTH: usize = 10;

fn bar(percent: u8) -> String {
    let filled = ((percent as usize + 5) / 10).min(BAR_WIDTH);
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

pub fn render_result(result: &PrakritiResult) -> String {
    let mut text = format!("<b>Your Prakriti: {}</b>\n\n", result.constitution);

    for dosha in Dosha::ALL {
        let percent = result.percentage(dosha);
        text.push_str(&format!("<code>{:<6}{} {:>3}%</code>\n", dosha, bar(percent), percent));
    }

    text.push_str(&format!(
        "\n<b>{}</b>: {}\n",
        result.dominant,
        result.dominant.description()
    ));
    if result.is_dual() {
        text.push_str(&format!(
            "<b>{}</b>: {}\n",
            result.secondary,
            result.secondary.description()
        ));
    }

    text.push_str("\n<b>Suggestions</b>\n");
    for suggestion in result.dominant.suggestions() {
        text.push_str(&format!("• {}\n", suggestion));
    }

    text.push_str(&format!("\n<i>{}</i>", FOOTER_TEXT));
    text
}

pub fn render_stored(stored: &StoredAssessment) -> String {
    let record = &stored.record;
    format!(
        "<b>Your last assessment</b> ({})\n\nConstitution: <b>{}</b>\nVata {}% · Pitta {}% · Kapha {}%\nAnswered {} of {} questions",
        stored.created_at.format("%d/%m/%Y"),
        html::escape(&record.constitution.to_string()),
        record.vata_score,
        record.pitta_score,
        record.kapha_score,
        record.answers.len(),
        record.total_questions
    )
}
