//! # Roster
//!
//! The fixed list of colleagues. Users are never created or removed at runtime.

use once_cell::sync::Lazy;

use crate::models::User;

/// Shared access code for every user. Not hashed, not salted.
pub const DEFAULT_PIN: &str = "1234";

const ENTRIES: &[(&str, &str, &str)] = &[
    ("1", "Franco C.", "Admin"),
    ("2", "Giovanni C.", "Tecnico"),
    ("3", "Gennaro M.", "Operaio"),
    ("4", "Cristina B.", "Amministrazione"),
    ("5", "Alessia C.", "Vendite"),
    ("6", "Laura R.", "HR"),
    ("7", "Giuseppe G.", "Logistica"),
    ("8", "Claudia C.", "Design"),
    ("9", "Iacopo C.", "IT"),
    ("10", "Fabio L.", "Manager"),
    ("11", "Officina", "Reparto"),
    ("12", "Magazzino", "Reparto"),
];

pub static ROSTER: Lazy<Vec<User>> = Lazy::new(|| {
    ENTRIES
        .iter()
        .map(|(id, name, role)| User {
            id: (*id).to_string(),
            name: (*name).to_string(),
            role: Some((*role).to_string()),
        })
        .collect()
});

pub fn find_user(id: &str) -> Option<&'static User> {
    ROSTER.iter().find(|u| u.id == id)
}
