//! Login against the roster and the shared PIN.

use domains::{find_user, AuthError, User, DEFAULT_PIN};

/// `user_id` is whatever was picked from the roster; blank means nothing was.
pub fn login(user_id: &str, pin: &str) -> Result<&'static User, AuthError> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(AuthError::NoUserSelected);
    }
    if pin.trim() != DEFAULT_PIN {
        tracing::info!(user = user_id, "login rejected: wrong PIN");
        return Err(AuthError::WrongPin);
    }
    let user = find_user(user_id).ok_or_else(|| AuthError::UnknownUser(user_id.to_string()))?;
    tracing::info!(user = %user.id, name = %user.name, "logged in");
    Ok(user)
}
