mod backend;
mod config;
mod error;
mod quiz;
mod sections;
mod widgets;

use std::sync::{Arc, LazyLock};

use backend::{ConsultationRequest, Services, SessionKey, SignUpOutcome};
use chrono::NaiveDate;
use config::Config;
use dotenv::dotenv;
use error::BackendError;
use quiz::{
    bank::QuestionBank,
    classifier::classify,
    progress::{QuizProgress, QuizStep},
};
use regex::Regex;
use teloxide::{
    dispatching::{
        dialogue::{serializer::Json, ErasedStorage, SqliteStorage, Storage},
        UpdateHandler,
    },
    prelude::*,
    types::{KeyboardButton, KeyboardMarkup, KeyboardRemove, ParseMode},
    utils::{command::BotCommands, html},
};
use widgets::{
    date::{validate_booking_date, DateParts},
    phone::PhoneNumber,
    time::TimeParts,
};

type BotDialogue = Dialogue<State, ErasedStorage<State>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type DialogueStorage = Arc<ErasedStorage<State>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AuthIntent {
    SignIn,
    SignUp,
}

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub enum State {
    #[default]
    Start,
    ReceiveEmail {
        intent: AuthIntent,
    },
    ReceivePassword {
        intent: AuthIntent,
        email: String,
    },
    PrakritiQuiz {
        progress: QuizProgress,
    },
    BookingReceiveName,
    BookingReceivePhone {
        name: String,
    },
    BookingReceiveDate {
        name: String,
        phone: String,
    },
    BookingReceiveTime {
        name: String,
        phone: String,
        date: NaiveDate,
    },
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
enum Command {
    #[command(description = "show the main menu")]
    Start,
    #[command(description = "show this text")]
    Help,
    #[command(description = "what Prakriti is")]
    About,
    #[command(description = "what this bot can do")]
    Features,
    #[command(description = "take the Prakriti self-assessment")]
    Quiz,
    #[command(description = "book a consultation")]
    Book,
    #[command(description = "create an account")]
    Signup,
    #[command(description = "sign in to save your results")]
    Signin,
    #[command(description = "sign out")]
    Signout,
    #[command(description = "show who is signed in")]
    Whoami,
    #[command(description = "show your last saved result")]
    Myresult,
    #[command(description = "stop what you are doing")]
    Cancel,
}

#[tokio::main]
async fn main() -> HandlerResult {
    dotenv().ok();
    pretty_env_logger::init();
    log::info!("Starting Prakriti bot...");

    let config = Arc::new(Config::from_env()?);
    let services = Services::from_config(&config.backend)?;

    let bot = Bot::from_env();

    log::info!("Opening dialogue storage at {}", config.dialogue_db);
    let storage: DialogueStorage = SqliteStorage::open(&config.dialogue_db, Json)
        .await
        .map_err(|err| format!("Failed to open dialogue storage: {}", err))?
        .erase();

    if let Err(err) = bot.set_my_commands(Command::bot_commands()).await {
        log::warn!("Could not register bot commands: {}", err);
    }

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![storage, services, config])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
    Ok(())
}

fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Start].endpoint(start))
        .branch(case![Command::Help].endpoint(help))
        .branch(case![Command::About].endpoint(about))
        .branch(case![Command::Features].endpoint(features))
        .branch(case![Command::Quiz].endpoint(begin_quiz))
        .branch(case![Command::Book].endpoint(begin_booking))
        .branch(case![Command::Signup].endpoint(begin_sign_up))
        .branch(case![Command::Signin].endpoint(begin_sign_in))
        .branch(case![Command::Signout].endpoint(sign_out))
        .branch(case![Command::Whoami].endpoint(whoami))
        .branch(case![Command::Myresult].endpoint(my_result))
        .branch(case![Command::Cancel].endpoint(cancel));

    Update::filter_message()
        .enter_dialogue::<Message, ErasedStorage<State>, State>()
        .branch(command_handler)
        .branch(case![State::Start].endpoint(receive_menu_choice))
        .branch(case![State::ReceiveEmail { intent }].endpoint(receive_email))
        .branch(case![State::ReceivePassword { intent, email }].endpoint(receive_password))
        .branch(case![State::PrakritiQuiz { progress }].endpoint(prakriti_quiz))
        .branch(case![State::BookingReceiveName].endpoint(booking_receive_name))
        .branch(case![State::BookingReceivePhone { name }].endpoint(booking_receive_phone))
        .branch(case![State::BookingReceiveDate { name, phone }].endpoint(booking_receive_date))
        .branch(
            case![State::BookingReceiveTime { name, phone, date }].endpoint(booking_receive_time),
        )
}

const TAKE_QUIZ: &str = "Take the Prakriti quiz";
const BOOK_CONSULTATION: &str = "Book a consultation";
const ABOUT_PRAKRITI: &str = "What is Prakriti?";
const BACK: &str = "⬅ Back";

fn main_menu() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new(TAKE_QUIZ)],
        vec![
            KeyboardButton::new(BOOK_CONSULTATION),
            KeyboardButton::new(ABOUT_PRAKRITI),
        ],
    ])
    .resize_keyboard(true)
}

const GREETING_TEXT: &str = "Namaste! I can help you discover your Ayurvedic constitution (Prakriti) \
and book a consultation with a practitioner. What would you like to do?";

async fn start(bot: Bot, dialogue: BotDialogue, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, GREETING_TEXT)
        .reply_markup(main_menu())
        .await?;
    dialogue.update(State::Start).await?;
    Ok(())
}

fn help_text() -> String {
    format!("{}\n\n{}", Command::descriptions(), sections::FOOTER_TEXT)
}

async fn help(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, help_text()).await?;
    Ok(())
}

async fn about(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, sections::ABOUT_TEXT)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

async fn features(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, sections::FEATURES_TEXT)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

async fn cancel(bot: Bot, dialogue: BotDialogue, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, "Cancelled.")
        .reply_markup(main_menu())
        .await?;
    dialogue.update(State::Start).await?;
    Ok(())
}

async fn receive_menu_choice(
    bot: Bot,
    dialogue: BotDialogue,
    config: Arc<Config>,
    msg: Message,
) -> HandlerResult {
    let choice = msg.text().map(str::to_owned);
    match choice.as_deref() {
        Some(TAKE_QUIZ) => begin_quiz(bot, dialogue, config, msg).await,
        Some(BOOK_CONSULTATION) => begin_booking(bot, dialogue, msg).await,
        Some(ABOUT_PRAKRITI) => about(bot, msg).await,
        _ => start(bot, dialogue, msg).await,
    }
}

// Quiz

async fn begin_quiz(
    bot: Bot,
    dialogue: BotDialogue,
    config: Arc<Config>,
    msg: Message,
) -> HandlerResult {
    let bank = QuestionBank::prakriti();
    let progress = QuizProgress::new(&bank, config.shuffle_options);

    bot.send_message(
        msg.chat.id,
        format!(
            "Let's begin! There are {} questions. Pick the answer that has been true for most of your life, not just how you feel today.",
            bank.len()
        ),
    )
    .await?;
    ask_question(&bot, msg.chat.id, &progress, &bank).await?;

    dialogue.update(State::PrakritiQuiz { progress }).await?;
    Ok(())
}

async fn ask_question(
    bot: &Bot,
    chat_id: ChatId,
    progress: &QuizProgress,
    bank: &QuestionBank,
) -> HandlerResult {
    let Some(question) = progress.current(bank) else {
        return Ok(());
    };

    let mut text = format!(
        "<b>{}</b> · {}\n\n{}",
        progress.progress_label(bank),
        question.category,
        question.text
    );
    // show the earlier pick by its text, the label would give the scoring away
    if let Some(previous) = progress
        .previous_answer(bank)
        .and_then(|label| question.options.iter().find(|o| o.dosha.as_str() == label))
    {
        text.push_str(&format!("\n\n<i>Your earlier answer: {}</i>", previous.text));
    }

    let mut rows: Vec<Vec<KeyboardButton>> = progress
        .current_options(bank)
        .into_iter()
        .map(|option| vec![KeyboardButton::new(option.text)])
        .collect();
    if progress.position() > 0 {
        rows.push(vec![KeyboardButton::new(BACK)]);
    }

    bot.send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(KeyboardMarkup::new(rows).resize_keyboard(true))
        .await?;
    Ok(())
}

async fn prakriti_quiz(
    bot: Bot,
    dialogue: BotDialogue,
    services: Services,
    progress: QuizProgress,
    msg: Message,
) -> HandlerResult {
    let bank = QuestionBank::prakriti();
    let mut progress = progress;

    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, "Please choose one of the options below.")
            .await?;
        return Ok(());
    };

    if text == BACK {
        if !progress.back() {
            bot.send_message(msg.chat.id, "This is the first question.")
                .await?;
            return Ok(());
        }
    } else {
        match progress.answer(&bank, text) {
            QuizStep::Recorded(dosha) => {
                log::debug!("Chat {} answered {}", msg.chat.id.0, dosha);
            }
            QuizStep::Unrecognized => {
                bot.send_message(msg.chat.id, "Please choose one of the options below.")
                    .await?;
                return Ok(());
            }
        }
    }

    if progress.is_complete(&bank) {
        dialogue.update(State::Start).await?;
        return finish_quiz(&bot, &services, msg.chat.id, progress, &bank).await;
    }

    ask_question(&bot, msg.chat.id, &progress, &bank).await?;
    dialogue.update(State::PrakritiQuiz { progress }).await?;
    Ok(())
}

async fn finish_quiz(
    bot: &Bot,
    services: &Services,
    chat_id: ChatId,
    progress: QuizProgress,
    bank: &QuestionBank,
) -> HandlerResult {
    let answers = progress.into_answers();
    let result = classify(&answers);
    log::info!(
        "Chat {} finished the quiz: {} (V {} / P {} / K {})",
        chat_id.0,
        result.constitution,
        result.vata,
        result.pitta,
        result.kapha
    );

    bot.send_message(chat_id, sections::render_result(&result))
        .parse_mode(ParseMode::Html)
        .reply_markup(main_menu())
        .await?;

    let saved = services
        .submit_assessment(SessionKey::from(chat_id), &result, answers, bank.len())
        .await;
    let note = match saved {
        Ok(stored) => {
            log::debug!("Stored assessment {} for chat {}", stored.id, chat_id.0);
            "Your result has been saved to your account. See it any time with /myresult.".to_string()
        }
        Err(BackendError::NotAuthenticated) => {
            "Sign in with /signin or create an account with /signup to keep your results next time."
                .to_string()
        }
        Err(err) => {
            log::warn!("Could not save assessment for chat {}: {}", chat_id.0, err);
            format!("Your result could not be saved right now ({}).", err)
        }
    };
    bot.send_message(chat_id, format!("{}\n\n{}", note, sections::CTA_TEXT))
        .await?;
    Ok(())
}

async fn my_result(bot: Bot, services: Services, msg: Message) -> HandlerResult {
    let text = match services.latest_assessment(SessionKey::from(msg.chat.id)).await {
        Ok(Some(stored)) => sections::render_stored(&stored),
        Ok(None) => "You have no saved results yet. Take the quiz with /quiz.".to_string(),
        Err(BackendError::NotAuthenticated) => {
            "Sign in with /signin to see your saved results.".to_string()
        }
        Err(err) => {
            log::warn!("Could not load assessment for chat {}: {}", msg.chat.id.0, err);
            format!("Your results could not be loaded right now ({}).", html::escape(&err.to_string()))
        }
    };
    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

// Accounts

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static regex"));

fn is_plausible_email(text: &str) -> bool {
    EMAIL.is_match(text.trim())
}

async fn begin_sign_up(
    bot: Bot,
    dialogue: BotDialogue,
    services: Services,
    msg: Message,
) -> HandlerResult {
    begin_auth(bot, dialogue, services, msg, AuthIntent::SignUp).await
}

async fn begin_sign_in(
    bot: Bot,
    dialogue: BotDialogue,
    services: Services,
    msg: Message,
) -> HandlerResult {
    begin_auth(bot, dialogue, services, msg, AuthIntent::SignIn).await
}

async fn begin_auth(
    bot: Bot,
    dialogue: BotDialogue,
    services: Services,
    msg: Message,
    intent: AuthIntent,
) -> HandlerResult {
    if let Ok(Some(user)) = services.identity.current_user(msg.chat.id.into()).await {
        bot.send_message(
            msg.chat.id,
            format!(
                "You are already signed in as {}. Use /signout first to switch accounts.",
                user.email.as_deref().unwrap_or("an unnamed user")
            ),
        )
        .await?;
        return Ok(());
    }

    bot.send_message(msg.chat.id, "What is your email address?")
        .reply_markup(KeyboardRemove::new())
        .await?;
    dialogue.update(State::ReceiveEmail { intent }).await?;
    Ok(())
}

async fn receive_email(
    bot: Bot,
    dialogue: BotDialogue,
    intent: AuthIntent,
    msg: Message,
) -> HandlerResult {
    match msg.text() {
        Some(email) if is_plausible_email(email) => {
            let prompt = match intent {
                AuthIntent::SignIn => "Now your password. I will delete the message right after reading it.",
                AuthIntent::SignUp => "Choose a password (at least 6 characters). I will delete the message right after reading it.",
            };
            bot.send_message(msg.chat.id, prompt).await?;
            dialogue
                .update(State::ReceivePassword {
                    intent,
                    email: email.trim().to_string(),
                })
                .await?;
        }
        _ => {
            bot.send_message(msg.chat.id, "That does not look like an email address, please try again.")
                .await?;
        }
    }
    Ok(())
}

async fn receive_password(
    bot: Bot,
    dialogue: BotDialogue,
    services: Services,
    (intent, email): (AuthIntent, String),
    msg: Message,
) -> HandlerResult {
    let Some(password) = msg.text() else {
        bot.send_message(msg.chat.id, "Please send your password as text.")
            .await?;
        return Ok(());
    };

    // Not being able to delete it is not worth failing the sign in over
    let _ = bot.delete_message(msg.chat.id, msg.id).await;

    let key = SessionKey::from(msg.chat.id);
    let reply = match intent {
        AuthIntent::SignIn => match services.identity.sign_in(key, &email, password).await {
            Ok(_) => format!("Signed in as {}.", email),
            Err(BackendError::InvalidCredentials) => {
                "Wrong email or password. Try again with /signin.".to_string()
            }
            Err(err) => {
                log::warn!("Sign in failed for chat {}: {}", msg.chat.id.0, err);
                format!("Signing in failed ({}).", err)
            }
        },
        AuthIntent::SignUp => match services.identity.sign_up(key, &email, password).await {
            Ok(SignUpOutcome::SignedIn(_)) => {
                log::info!("New account for chat {}", msg.chat.id.0);
                format!("Welcome! Your account {} is ready and you are signed in.", email)
            }
            Ok(SignUpOutcome::ConfirmationRequired(_)) => format!(
                "Almost there: we sent a confirmation link to {}. Confirm it, then /signin.",
                email
            ),
            Err(BackendError::AlreadyRegistered) => {
                "That email is already registered. Use /signin instead.".to_string()
            }
            Err(err) => {
                log::warn!("Sign up failed for chat {}: {}", msg.chat.id.0, err);
                format!("Creating your account failed ({}).", err)
            }
        },
    };

    bot.send_message(msg.chat.id, reply)
        .reply_markup(main_menu())
        .await?;
    dialogue.update(State::Start).await?;
    Ok(())
}

async fn sign_out(bot: Bot, services: Services, msg: Message) -> HandlerResult {
    let reply = match services.identity.sign_out(msg.chat.id.into()).await {
        Ok(()) => "You are signed out.".to_string(),
        Err(err) => {
            log::warn!("Sign out failed for chat {}: {}", msg.chat.id.0, err);
            format!("Signing out failed ({}).", err)
        }
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn whoami(bot: Bot, services: Services, msg: Message) -> HandlerResult {
    let reply = match services.identity.current_user(msg.chat.id.into()).await {
        Ok(Some(user)) => format!(
            "Signed in as {}.",
            user.email.as_deref().unwrap_or("an unnamed user")
        ),
        Ok(None) => "You are not signed in.".to_string(),
        Err(err) => {
            log::warn!("Session lookup failed for chat {}: {}", msg.chat.id.0, err);
            format!("Could not check your session ({}).", err)
        }
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

// Consultation booking

const MAX_NAME_LEN: usize = 100;

async fn begin_booking(bot: Bot, dialogue: BotDialogue, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, "Let's book your consultation. What name should we book it under?")
        .reply_markup(KeyboardRemove::new())
        .await?;
    dialogue.update(State::BookingReceiveName).await?;
    Ok(())
}

async fn booking_receive_name(bot: Bot, dialogue: BotDialogue, msg: Message) -> HandlerResult {
    let name = msg.text().map(str::trim).unwrap_or_default();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        bot.send_message(msg.chat.id, "Please send your name as text.")
            .await?;
        return Ok(());
    }

    bot.send_message(
        msg.chat.id,
        "Which phone number can the practitioner call? For example +91 98765 43210.",
    )
    .await?;
    dialogue
        .update(State::BookingReceivePhone {
            name: name.to_string(),
        })
        .await?;
    Ok(())
}

async fn booking_receive_phone(
    bot: Bot,
    dialogue: BotDialogue,
    config: Arc<Config>,
    name: String,
    msg: Message,
) -> HandlerResult {
    let parsed = PhoneNumber::parse(
        msg.text().unwrap_or_default(),
        config.default_calling_code.as_deref(),
    );
    let phone = match parsed {
        Ok(phone) => phone,
        Err(err) => {
            bot.send_message(msg.chat.id, format!("{}. Please try again.", err))
                .await?;
            return Ok(());
        }
    };

    bot.send_message(
        msg.chat.id,
        format!(
            "Got it: {}.\nWhich date would suit you? Send it as DD/MM/YYYY.",
            phone
        ),
    )
    .await?;
    dialogue
        .update(State::BookingReceiveDate {
            name,
            phone: phone.e164(),
        })
        .await?;
    Ok(())
}

async fn booking_receive_date(
    bot: Bot,
    dialogue: BotDialogue,
    (name, phone): (String, String),
    msg: Message,
) -> HandlerResult {
    let today = chrono::Local::now().date_naive();
    let date = DateParts::parse(msg.text().unwrap_or_default())
        .and_then(|parts| parts.to_date())
        .and_then(|date| validate_booking_date(date, today));
    let date = match date {
        Ok(date) => date,
        Err(err) => {
            bot.send_message(msg.chat.id, format!("{}. Please try again.", err))
                .await?;
            return Ok(());
        }
    };

    let suggestions = KeyboardMarkup::new(vec![vec![
        KeyboardButton::new("10:00 AM"),
        KeyboardButton::new("2:00 PM"),
        KeyboardButton::new("5:30 PM"),
    ]])
    .resize_keyboard(true);
    bot.send_message(
        msg.chat.id,
        format!(
            "{} it is. What time? For example 10:30 AM.",
            DateParts::from_date(date)
        ),
    )
    .reply_markup(suggestions)
    .await?;
    dialogue
        .update(State::BookingReceiveTime { name, phone, date })
        .await?;
    Ok(())
}

async fn booking_receive_time(
    bot: Bot,
    dialogue: BotDialogue,
    services: Services,
    (name, phone, date): (String, String, NaiveDate),
    msg: Message,
) -> HandlerResult {
    let time = TimeParts::parse(msg.text().unwrap_or_default()).and_then(|parts| parts.to_canonical());
    let canonical = match time {
        Ok(time) => time,
        Err(err) => {
            bot.send_message(msg.chat.id, format!("{}. Please try again.", err))
                .await?;
            return Ok(());
        }
    };

    let display_phone = PhoneNumber::parse(&phone, None)
        .map(|phone| phone.to_string())
        .unwrap_or_else(|_| phone.clone());
    let request = ConsultationRequest {
        user_id: None,
        name,
        phone,
        preferred_date: date,
        preferred_time: canonical,
    };

    let reply = match services
        .book_consultation(SessionKey::from(msg.chat.id), request)
        .await
    {
        Ok(stored) => {
            log::info!("Consultation {} booked from chat {}", stored.id, msg.chat.id.0);
            let display_time = TimeParts::from_canonical(&stored.request.preferred_time)
                .map(|parts| parts.to_string())
                .unwrap_or_else(|_| stored.request.preferred_time.clone());
            format!(
                "Booked! {}, we will call you on {} around {} on {}.",
                stored.request.name,
                display_phone,
                display_time,
                DateParts::from_date(stored.request.preferred_date)
            )
        }
        Err(err) => {
            log::warn!("Booking failed for chat {}: {}", msg.chat.id.0, err);
            format!("Your booking could not be saved right now ({}). Please try again later.", err)
        }
    };

    bot.send_message(msg.chat.id, reply)
        .reply_markup(main_menu())
        .await?;
    dialogue.update(State::Start).await?;
    Ok(())
}
