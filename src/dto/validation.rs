//! Validation helpers for DTOs.

use serde_json::Value;
use time::{Date, macros::format_description};
use validator::{ValidateEmail, ValidationError};

use crate::state::session_lifecycle::{self, LifecycleError};

/// Longest accepted username, in characters.
pub const USERNAME_MAX_CHARS: usize = 150;
const USERNAME_SYMBOLS: &str = "@.+-_";

fn lifecycle_error(code: &'static str, err: LifecycleError) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(err.to_string().into());
    error
}

/// Validates that a difficulty is one of the supported board sizes.
pub fn validate_board_size(difficulty: i64) -> Result<(), ValidationError> {
    session_lifecycle::validate_difficulty(difficulty)
        .map(|_| ())
        .map_err(|err| lifecycle_error("board_size", err))
}

/// Validates that a client game state is a JSON object.
pub fn validate_game_state(state: &Value) -> Result<(), ValidationError> {
    session_lifecycle::validate_game_state(state)
        .map_err(|err| lifecycle_error("game_state_object", err))
}

/// Validates that a score is not negative and fits the stored range.
pub fn validate_score(score: i64) -> Result<(), ValidationError> {
    session_lifecycle::validate_score(score)
        .map(|_| ())
        .map_err(|err| lifecycle_error("score_range", err))
}

/// Longest accepted profile bio, in characters.
pub const BIO_MAX_CHARS: usize = 1_000;

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_calendar_day(raw: &str) -> Result<Date, time::error::Parse> {
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
}

/// Validates that a value is a `YYYY-MM-DD` calendar date.
pub fn validate_calendar_day(raw: &str) -> Result<(), ValidationError> {
    parse_calendar_day(raw).map(|_| ()).map_err(|err| {
        let mut error = ValidationError::new("calendar_day");
        error.message = Some(format!("`{raw}` is not a YYYY-MM-DD date: {err}").into());
        error
    })
}

/// Validates that a bio stays within [`BIO_MAX_CHARS`].
pub fn validate_bio(bio: &str) -> Result<(), ValidationError> {
    let length = bio.chars().count();
    if length > BIO_MAX_CHARS {
        let mut error = ValidationError::new("bio_length");
        error.message =
            Some(format!("Bio must be at most {BIO_MAX_CHARS} characters (got {length})").into());
        return Err(error);
    }
    Ok(())
}

/// Validates a contact address.
pub fn validate_email_address(email: &str) -> Result<(), ValidationError> {
    if email.validate_email() {
        Ok(())
    } else {
        let mut error = ValidationError::new("email");
        error.message = Some(format!("`{email}` is not a valid email address").into());
        Err(error)
    }
}

/// Validates a username: 1 to 150 characters made of letters, digits and `@.+-_`.
///
/// # Examples
///
/// ```ignore
/// validate_username("ada.l+puzzles") // Ok
/// validate_username("")              // Err - empty
/// validate_username("ada lovelace")  // Err - space
/// ```
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let length = username.chars().count();
    if length == 0 || length > USERNAME_MAX_CHARS {
        let mut err = ValidationError::new("username_length");
        err.message = Some(
            format!("Username must be 1 to {USERNAME_MAX_CHARS} characters (got {length})").into(),
        );
        return Err(err);
    }

    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || USERNAME_SYMBOLS.contains(c))
    {
        let mut err = ValidationError::new("username_format");
        err.message =
            Some("Username may contain only letters, digits and @/./+/-/_ characters".into());
        return Err(err);
    }

    Ok(())
}
