use rand::Rng;
use rand::distr::Alphanumeric;

pub const AUTO_ID_LEN: usize = 20;

/// A random 20-character alphanumeric document id.
#[must_use]
pub fn new_auto_id() -> String {
    rand::rng().sample_iter(&Alphanumeric).take(AUTO_ID_LEN).map(char::from).collect()
}

/// Id for a write: the caller's id, the part after a comma when the caller
/// sent `"parent,id"`, or a fresh auto id.
#[must_use]
pub fn resolve_document_id(id: Option<&str>) -> String {
    match id {
        Some(id) if !id.is_empty() => match id.split_once(',') {
            Some((_, tail)) => tail.split(',').next().unwrap_or(tail).to_owned(),
            None => id.to_owned(),
        },
        _ => new_auto_id(),
    }
}
