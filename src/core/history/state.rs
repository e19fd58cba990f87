//! core::history::state
//!
//! Immutable commit records.
//!
//! # Stored form
//!
//! ```text
//! CS::>>{id}::>>{content|null}
//! PS::>>{parent}            one line per parent, in branch order
//! VP::>>{valid previous|null}
//! MD::>>{timestamp}::>>{author}::>>{valid}::>>{message}
//! ST::>>{unit count}        stage states only
//! LS::>>{unit}::>>{hash|null}
//! ```
//!
//! The fingerprint is the hash of that text, so it covers every field
//! including the timestamp. The traversal route is not stored.

use std::collections::BTreeMap;

use crate::core::codec::{self, escape, unescape, CodecError, MemberLine, Token};
use crate::core::element::ElementError;
use crate::core::fingerprint::hash_str;
use crate::core::store::ObjectStore;
use crate::core::types::{ElementName, Fingerprint, StateId, UtcTimestamp};

use super::Path;

/// Commit hash of every managed unit at staging time.
pub type UnitSnapshot = BTreeMap<ElementName, Option<Fingerprint>>;

/// Descriptive fields of a state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateMetadata {
    pub timestamp: UtcTimestamp,
    pub author: String,
    pub valid: bool,
    pub message: String,
}

/// Fields of a state that the caller chooses. Ids and timestamps are
/// supplied when the draft is minted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateDraft {
    pub content: Option<Fingerprint>,
    pub previous: Vec<Fingerprint>,
    pub valid_previous: Option<Fingerprint>,
    pub author: String,
    pub message: String,
    pub valid: bool,
    pub units: Option<UnitSnapshot>,
}

impl StateDraft {
    pub fn new(author: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            content: None,
            previous: Vec::new(),
            valid_previous: None,
            author: author.into(),
            message: message.into(),
            valid: true,
            units: None,
        }
    }
}

/// An immutable commit record.
#[derive(Debug, Clone)]
pub struct State {
    id: StateId,
    content: Option<Fingerprint>,
    previous: Vec<Fingerprint>,
    valid_previous: Option<Fingerprint>,
    metadata: StateMetadata,
    units: Option<UnitSnapshot>,
    fingerprint: Fingerprint,
    route: Path,
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
    }
}

impl Eq for State {}

impl State {
    /// Fix a draft into a state.
    pub fn mint(draft: StateDraft, id: StateId, timestamp: UtcTimestamp) -> Self {
        let mut state = Self {
            id,
            content: draft.content,
            previous: draft.previous,
            valid_previous: draft.valid_previous,
            metadata: StateMetadata {
                timestamp,
                author: draft.author,
                valid: draft.valid,
                message: draft.message,
            },
            units: draft.units,
            // placeholder until the description is hashed below
            fingerprint: hash_str(""),
            route: Path::default(),
        };
        state.fingerprint = hash_str(&state.describe());
        state
    }

    pub fn id(&self) -> &StateId {
        &self.id
    }

    /// Hash of the content container, `None` for temporary commits.
    pub fn content(&self) -> Option<&Fingerprint> {
        self.content.as_ref()
    }

    /// Parents in branch order. Grafted parents are not included; ask the
    /// graph for the effective list.
    pub fn previous(&self) -> &[Fingerprint] {
        &self.previous
    }

    pub fn valid_previous(&self) -> Option<&Fingerprint> {
        self.valid_previous.as_ref()
    }

    pub fn metadata(&self) -> &StateMetadata {
        &self.metadata
    }

    pub fn units(&self) -> Option<&UnitSnapshot> {
        self.units.as_ref()
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn is_temporary(&self) -> bool {
        self.content.is_none()
    }

    /// How this instance was reached from a head.
    pub fn route(&self) -> &Path {
        &self.route
    }

    pub fn with_route(mut self, route: Path) -> Self {
        self.route = route;
        self
    }

    pub fn describe(&self) -> String {
        codec::join(&self.member_lines())
    }

    fn member_lines(&self) -> Vec<MemberLine> {
        let mut lines = vec![MemberLine::new(
            Token::State,
            [
                self.id.as_str(),
                Fingerprint::encode_nullable(self.content.as_ref()),
            ],
        )];
        lines.extend(
            self.previous
                .iter()
                .map(|p| MemberLine::new(Token::Previous, [p.as_str()])),
        );
        lines.push(MemberLine::new(
            Token::ValidPrevious,
            [Fingerprint::encode_nullable(self.valid_previous.as_ref())],
        ));
        lines.push(MemberLine::new(
            Token::Metadata,
            [
                self.metadata.timestamp.to_string(),
                escape(&self.metadata.author),
                self.metadata.valid.to_string(),
                escape(&self.metadata.message),
            ],
        ));
        if let Some(units) = &self.units {
            lines.push(MemberLine::new(Token::Stage, [units.len().to_string()]));
            lines.extend(units.iter().map(|(name, hash)| {
                MemberLine::new(
                    Token::LogicalUnit,
                    [name.as_str(), Fingerprint::encode_nullable(hash.as_ref())],
                )
            }));
        }
        lines
    }

    /// Parse a stored state and verify it against `expected`.
    pub fn decode(bytes: &[u8], expected: &Fingerprint) -> Result<Self, ElementError> {
        let lines = codec::lines(bytes)?;
        let mut members = lines.iter().map(|line| {
            let max = line.starts_with(Token::Metadata.as_str()).then_some(4);
            MemberLine::parse(line, max)
        });

        let header = members.next().ok_or(CodecError::Missing("CS"))??;
        if header.token != Token::State {
            return Err(CodecError::Missing("CS").into());
        }
        header.expect_fields("CS", 2)?;
        let id = StateId::from_string(header.fields[0].as_str());
        let content = Fingerprint::parse_nullable(&header.fields[1])?;

        let mut previous = Vec::new();
        let mut valid_previous = None;
        let mut metadata = None;
        let mut units: Option<UnitSnapshot> = None;
        let mut declared_units = 0usize;

        for member in members {
            let member = member?;
            match member.token {
                Token::Previous => {
                    member.expect_fields("PS", 1)?;
                    previous.push(Fingerprint::new(member.fields[0].as_str())?);
                }
                Token::ValidPrevious => {
                    member.expect_fields("VP", 1)?;
                    valid_previous = Fingerprint::parse_nullable(&member.fields[0])?;
                }
                Token::Metadata => {
                    member.expect_fields("MD", 4)?;
                    let valid = member.fields[2]
                        .parse::<bool>()
                        .map_err(|_| CodecError::InvalidField(member.fields[2].clone()))?;
                    metadata = Some(StateMetadata {
                        timestamp: UtcTimestamp::parse(&member.fields[0])?,
                        author: unescape(&member.fields[1]),
                        valid,
                        message: unescape(&member.fields[3]),
                    });
                }
                Token::Stage => {
                    member.expect_fields("ST", 1)?;
                    declared_units = member.fields[0]
                        .parse()
                        .map_err(|_| CodecError::InvalidField(member.fields[0].clone()))?;
                    units = Some(UnitSnapshot::new());
                }
                Token::LogicalUnit => {
                    member.expect_fields("LS", 2)?;
                    let snapshot = units.as_mut().ok_or(CodecError::Missing("ST"))?;
                    snapshot.insert(
                        ElementName::new(member.fields[0].as_str())?,
                        Fingerprint::parse_nullable(&member.fields[1])?,
                    );
                }
                other => {
                    return Err(CodecError::UnknownToken(other.as_str().to_string()).into());
                }
            }
        }

        if let Some(snapshot) = &units {
            if snapshot.len() != declared_units {
                return Err(CodecError::FieldCount {
                    token: "LS",
                    expected: declared_units,
                    actual: snapshot.len(),
                }
                .into());
            }
        }

        let state = Self {
            id,
            content,
            previous,
            valid_previous,
            metadata: metadata.ok_or(CodecError::Missing("MD"))?,
            units,
            fingerprint: expected.clone(),
            route: Path::default(),
        };
        if hash_str(&state.describe()) != *expected {
            return Err(ElementError::Corrupt(expected.clone()));
        }
        Ok(state)
    }

    /// Fetch and decode a stored state.
    pub fn load<S: ObjectStore + ?Sized>(
        store: &S,
        hash: &Fingerprint,
    ) -> Result<Self, ElementError> {
        let bytes = store
            .retrieve(hash)?
            .ok_or_else(|| ElementError::MissingContent(hash.clone()))?;
        Self::decode(&bytes, hash)
    }

    /// Store the state under its fingerprint.
    pub fn persist<S: ObjectStore + ?Sized>(&self, store: &S) -> Result<(), ElementError> {
        store.store(&self.fingerprint, self.describe().as_bytes())?;
        Ok(())
    }
}

/// A state that also records every managed unit's commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageState {
    state: State,
    units: UnitSnapshot,
}

impl StageState {
    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn units(&self) -> &UnitSnapshot {
        &self.units
    }

    pub fn into_state(self) -> State {
        self.state
    }
}

impl TryFrom<State> for StageState {
    type Error = State;

    fn try_from(state: State) -> Result<Self, Self::Error> {
        match state.units.clone() {
            Some(units) => Ok(Self { state, units }),
            None => Err(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fingerprint::hash_bytes;
    use crate::core::store::MemoryStore;

    fn timestamp() -> UtcTimestamp {
        UtcTimestamp::parse("2024-05-01T12:00:00.123456Z").unwrap()
    }

    fn draft() -> StateDraft {
        let mut draft = StateDraft::new("ada", "first\nline ::>> two");
        draft.content = Some(hash_bytes(b"tree"));
        draft.previous = vec![hash_bytes(b"p1"), hash_bytes(b"p2")];
        draft.valid_previous = Some(hash_bytes(b"p1"));
        draft
    }

    #[test]
    fn describe_layout() {
        let state = State::mint(draft(), StateId::from_string("id-1"), timestamp());
        let text = state.describe();
        let lines: Vec<_> = text.lines().collect();
        assert!(lines[0].starts_with("CS::>>id-1::>>"));
        assert!(lines[1].starts_with("PS::>>"));
        assert!(lines[2].starts_with("PS::>>"));
        assert!(lines[3].starts_with("VP::>>"));
        assert!(lines[4].starts_with("MD::>>2024-05-01T12:00:00.123456Z::>>ada::>>true::>>"));
        assert_eq!(lines.len(), 5);
        assert_eq!(*state.fingerprint(), hash_str(&text));
    }

    #[test]
    fn timestamp_participates_in_hash() {
        let a = State::mint(draft(), StateId::from_string("id"), timestamp());
        let later = UtcTimestamp::parse("2024-05-01T12:00:01Z").unwrap();
        let b = State::mint(draft(), StateId::from_string("id"), later);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn route_does_not_affect_identity() {
        let a = State::mint(draft(), StateId::from_string("id"), timestamp());
        let b = a.clone().with_route("*1+2".parse().unwrap());
        assert_eq!(a, b);
        assert_eq!(a.describe(), b.describe());
    }

    #[test]
    fn persist_load_roundtrip() {
        let store = MemoryStore::new();
        let state = State::mint(draft(), StateId::generate(), timestamp());
        state.persist(&store).unwrap();
        let loaded = State::load(&store, state.fingerprint()).unwrap();
        assert_eq!(loaded.metadata(), state.metadata());
        assert_eq!(loaded.previous(), state.previous());
        assert_eq!(loaded.metadata().message, "first\nline ::>> two");
    }

    #[test]
    fn stage_state_roundtrip() {
        let store = MemoryStore::new();
        let mut d = StateDraft::new("ada", "stage");
        let mut units = UnitSnapshot::new();
        units.insert(ElementName::new("docs").unwrap(), Some(hash_bytes(b"d")));
        units.insert(ElementName::new("empty").unwrap(), None);
        d.units = Some(units.clone());
        let state = State::mint(d, StateId::generate(), timestamp());
        state.persist(&store).unwrap();

        let loaded = State::load(&store, state.fingerprint()).unwrap();
        let stage = StageState::try_from(loaded).unwrap();
        assert_eq!(stage.units(), &units);
    }

    #[test]
    fn plain_state_is_not_a_stage_state() {
        let state = State::mint(draft(), StateId::generate(), timestamp());
        assert!(StageState::try_from(state).is_err());
    }

    #[test]
    fn root_and_temporary_states() {
        let state = State::mint(StateDraft::new("a", "m"), StateId::generate(), timestamp());
        assert!(state.previous().is_empty());
        assert!(state.valid_previous().is_none());
        assert!(state.is_temporary());
        assert!(state.describe().starts_with(&format!("CS::>>{}::>>null", state.id())));
    }

    #[test]
    fn tampered_state_detected() {
        let state = State::mint(draft(), StateId::generate(), timestamp());
        let tampered = state.describe().replace("::>>ada::>>", "::>>eve::>>");
        assert!(matches!(
            State::decode(tampered.as_bytes(), state.fingerprint()),
            Err(ElementError::Corrupt(_))
        ));
    }

    #[test]
    fn missing_state_reported() {
        let store = MemoryStore::new();
        assert!(matches!(
            State::load(&store, &hash_bytes(b"absent")),
            Err(ElementError::MissingContent(_))
        ));
    }
}
