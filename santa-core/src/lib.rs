mod draw;
mod gate;

pub use draw::{generate, generate_with};
pub use gate::{reveal, HashCost, Reveal, SecretHasher};

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use thiserror::Error;

pub type Member = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pairing {
    pub giver: Member,
    pub receiver: Member,
}

/// A pairing plus the secret gating its reveal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Assignment {
    pub giver: Member,
    pub receiver: Member,
    #[serde(
        default,
        alias = "password",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_none"
    )]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub has_access: bool,
}

impl From<Pairing> for Assignment {
    fn from(pairing: Pairing) -> Self {
        Self {
            giver: pairing.giver,
            receiver: pairing.receiver,
            password_hash: None,
            has_access: false,
        }
    }
}

/// Members and assignments of the current round. This is also the persisted
/// document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub members: Vec<Member>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub pairs: Vec<Assignment>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("member {0:?} already exists")]
    DuplicateName(Member),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("no assignment for giver {0:?}")]
    NotFound(Member),
    #[error("wrong secret")]
    WrongSecret,
    #[error("secret hashing failed: {0}")]
    Hash(String),
}

pub fn normalize_name(raw: &str) -> Result<Member, ValidationError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(name.to_string())
}

impl Session {
    /// Returns a copy of this session with `raw` added as a member and every
    /// pairing drawn again. `self` is left untouched.
    pub fn with_member<R: Rng + ?Sized>(
        &self,
        raw: &str,
        rng: &mut R,
    ) -> Result<Session, ValidationError> {
        let name = normalize_name(raw)?;
        if self.members.contains(&name) {
            return Err(ValidationError::DuplicateName(name));
        }

        let mut staged = Session {
            members: self.members.clone(),
            pairs: Vec::new(),
        };
        staged.members.push(name);
        staged.redraw(rng);
        Ok(staged)
    }

    /// Replaces all assignments with a fresh draw, dropping any claimed
    /// secrets.
    pub fn redraw<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.pairs = generate(&self.members, rng)
            .into_iter()
            .map(Assignment::from)
            .collect();
    }

    pub fn assignment(&self, giver: &str) -> Option<&Assignment> {
        self.pairs.iter().find(|a| a.giver == giver)
    }

    pub fn reveal(
        &mut self,
        giver: &str,
        submitted: &str,
        hasher: &SecretHasher,
    ) -> Result<Reveal, AuthError> {
        let assignment = self
            .pairs
            .iter_mut()
            .find(|a| a.giver == giver)
            .ok_or_else(|| AuthError::NotFound(giver.to_string()))?;
        gate::reveal(assignment, submitted, hasher)
    }

    /// Whether the assignments form a derangement over the members (or are
    /// empty when there are fewer than two).
    pub fn is_consistent(&self) -> bool {
        if self.members.len() < 2 {
            return self.pairs.is_empty();
        }
        if self.pairs.len() != self.members.len() || !all_distinct(&self.members) {
            return false;
        }

        let members: HashSet<&str> = self.members.iter().map(String::as_str).collect();
        let givers: HashSet<&str> = self.pairs.iter().map(|a| a.giver.as_str()).collect();
        let receivers: HashSet<&str> = self.pairs.iter().map(|a| a.receiver.as_str()).collect();

        givers == members
            && receivers == members
            && self.pairs.iter().all(|a| a.giver != a.receiver)
    }

    /// Drops blank and repeated members, keeping the first occurrence.
    /// Returns how many entries were removed.
    pub fn sanitize(&mut self) -> usize {
        let before = self.members.len();
        let mut seen = HashSet::new();
        self.members
            .retain(|m| !m.trim().is_empty() && seen.insert(m.clone()));
        before - self.members.len()
    }
}

pub(crate) fn all_distinct(members: &[Member]) -> bool {
    let mut seen = HashSet::with_capacity(members.len());
    members.iter().all(|m| seen.insert(m))
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(9)
    }

    fn hasher() -> SecretHasher {
        SecretHasher::new(HashCost {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap()
    }

    fn session_of(names: &[&str]) -> Session {
        let mut rng = rng();
        names.iter().fold(Session::default(), |session, name| {
            session.with_member(name, &mut rng).unwrap()
        })
    }

    #[test]
    fn normalize_trims_and_rejects_blank() {
        assert_eq!(normalize_name("  ana \n").unwrap(), "ana");
        assert_eq!(normalize_name("   "), Err(ValidationError::EmptyName));
        assert_eq!(normalize_name(""), Err(ValidationError::EmptyName));
    }

    #[test]
    fn single_member_has_no_pairs() {
        let session = session_of(&["ana"]);
        assert_eq!(session.members, vec!["ana"]);
        assert!(session.pairs.is_empty());
        assert!(session.is_consistent());
    }

    #[test]
    fn adding_members_redraws_everything() {
        let session = session_of(&["A", "B", "C"]);
        assert_eq!(session.members, vec!["A", "B", "C"]);
        assert_eq!(session.pairs.len(), 3);
        assert!(session.is_consistent());
    }

    #[test]
    fn duplicate_after_trim_is_rejected() {
        let session = session_of(&["A", "B"]);
        let err = session.with_member(" A ", &mut rng()).unwrap_err();
        assert_eq!(err, ValidationError::DuplicateName("A".into()));
    }

    #[test]
    fn names_compare_exactly() {
        let session = session_of(&["ana"]);
        let staged = session.with_member("Ana", &mut rng()).unwrap();
        assert_eq!(staged.members, vec!["ana", "Ana"]);
    }

    #[test]
    fn with_member_leaves_original_untouched() {
        let session = session_of(&["A", "B"]);
        let snapshot = session.clone();
        let staged = session.with_member("C", &mut rng()).unwrap();
        assert_eq!(session, snapshot);
        assert_eq!(staged.members.len(), 3);
    }

    #[test]
    fn adding_member_drops_claimed_secrets() {
        let hasher = hasher();
        let mut session = session_of(&["A", "B"]);
        session.reveal("A", "x", &hasher).unwrap();

        let staged = session.with_member("C", &mut rng()).unwrap();
        assert!(staged
            .pairs
            .iter()
            .all(|a| a.password_hash.is_none() && !a.has_access));
    }

    #[test]
    fn reveal_is_idempotent_for_first_secret() {
        let hasher = hasher();
        let mut session = session_of(&["A", "B", "C"]);
        let receiver = session.assignment("A").unwrap().receiver.clone();

        let first = session.reveal("A", "x", &hasher).unwrap();
        assert!(first.claimed);
        assert_eq!(first.receiver, receiver);
        assert!(session.assignment("A").unwrap().has_access);

        assert_eq!(
            session.reveal("A", "y", &hasher),
            Err(AuthError::WrongSecret)
        );
        let second = session.reveal("A", "x", &hasher).unwrap();
        assert_eq!(second.receiver, receiver);
        assert!(!second.claimed);
    }

    #[test]
    fn reveal_unknown_giver() {
        let mut session = session_of(&["A", "B"]);
        assert_eq!(
            session.reveal("Z", "x", &hasher()),
            Err(AuthError::NotFound("Z".into()))
        );
    }

    #[test]
    fn inconsistent_sessions_are_detected() {
        let mut session = session_of(&["A", "B", "C"]);
        session.pairs.pop();
        assert!(!session.is_consistent());

        let mut session = session_of(&["A", "B"]);
        session.pairs[0].receiver = "A".into();
        assert!(!session.is_consistent());

        let session = Session {
            members: vec!["A".into(), "B".into()],
            pairs: Vec::new(),
        };
        assert!(!session.is_consistent());

        let session = Session {
            members: vec!["A".into()],
            pairs: vec![Assignment::from(Pairing {
                giver: "A".into(),
                receiver: "B".into(),
            })],
        };
        assert!(!session.is_consistent());
    }

    #[test]
    fn sanitize_drops_blank_and_duplicate_members() {
        let mut session = Session {
            members: vec!["A".into(), " ".into(), "B".into(), "A".into()],
            pairs: Vec::new(),
        };
        assert_eq!(session.sanitize(), 2);
        assert_eq!(session.members, vec!["A", "B"]);
    }

    #[test]
    fn document_round_trip() {
        let hasher = hasher();
        let mut session = session_of(&["A", "B", "C"]);
        session.reveal("B", "x", &hasher).unwrap();

        let json = serde_json::to_string(&session).unwrap();
        let loaded: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, session);
    }

    #[test]
    fn unset_hash_is_omitted() {
        let session = session_of(&["A", "B"]);
        let value = serde_json::to_value(&session).unwrap();
        assert!(value["pairs"][0].get("password_hash").is_none());
        assert_eq!(value["pairs"][0]["has_access"], false);
    }

    #[test]
    fn loads_legacy_document() {
        let loaded: Session = serde_json::from_str(
            r#"{"members":["A","B"],"pairs":[
                {"giver":"A","receiver":"B","password":"$2a$10$abc","has_access":true},
                {"giver":"B","receiver":"A","password":"","has_access":false}
            ]}"#,
        )
        .unwrap();
        assert_eq!(loaded.pairs[0].password_hash.as_deref(), Some("$2a$10$abc"));
        assert_eq!(loaded.pairs[1].password_hash, None);
        assert!(loaded.is_consistent());

        let empty: Session = serde_json::from_str(r#"{"members":[],"pairs":null}"#).unwrap();
        assert_eq!(empty, Session::default());

        let bare: Session = serde_json::from_str("{}").unwrap();
        assert_eq!(bare, Session::default());
    }
}
