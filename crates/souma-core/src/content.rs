//! The content graph: Stars, Oneups and Planets.
//!
//! A Star is a post. Oneups are votes on a Star, at most one per
//! (creator, star) pair. Planets are typed attachments referenced by one or
//! more Stars.
//!
//! Stars only hold planet ids. Exporting a star with its planet summaries
//! goes through [`StarView`], which pairs the star with resolved planets.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::Result;
use crate::export::{Export, ExportMap, ExportValue};
use crate::state::{ContentState, OneupState, StateCode};
use crate::types::{OneupId, PersonaId, PlanetId, StarId, Timestamp};

/// Characters of star text shown in `Display`.
const PREVIEW_LEN: usize = 24;

/// Divisor applied to ranking seconds in [`Star::hot`].
const HOT_DECAY_SECS: f64 = 45_000.0;

/// A post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Star {
    pub id: StarId,
    pub text: String,
    pub created: Timestamp,
    pub modified: Timestamp,
    state: ContentState,
    creator_id: PersonaId,
    planets: BTreeSet<PlanetId>,
}

impl Star {
    /// A new published star.
    pub fn new(id: StarId, text: impl Into<String>, creator_id: PersonaId, now: Timestamp) -> Self {
        Self {
            id,
            text: text.into(),
            created: now,
            modified: now,
            state: ContentState::Published,
            creator_id,
            planets: BTreeSet::new(),
        }
    }

    /// Rebuild a star from stored fields.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: StarId,
        text: String,
        created: Timestamp,
        modified: Timestamp,
        state: ContentState,
        creator_id: PersonaId,
        planets: impl IntoIterator<Item = PlanetId>,
    ) -> Self {
        Self {
            id,
            text,
            created,
            modified,
            state,
            creator_id,
            planets: planets.into_iter().collect(),
        }
    }

    pub fn creator_id(&self) -> &PersonaId {
        &self.creator_id
    }

    pub fn state(&self) -> ContentState {
        self.state
    }

    /// Label of the current state.
    pub fn get_state(&self) -> &'static str {
        self.state.label()
    }

    /// Replace the state. Unknown codes leave the star untouched.
    pub fn set_state(&mut self, code: i64) -> Result<()> {
        self.state = ContentState::validate("star", code)?;
        Ok(())
    }

    pub fn set_text(&mut self, text: impl Into<String>, now: Timestamp) {
        self.text = text.into();
        self.modified = now;
    }

    pub fn touch(&mut self, now: Timestamp) {
        self.modified = now;
    }

    /// Reference a planet. False if already attached.
    pub fn attach_planet(&mut self, planet: PlanetId, now: Timestamp) -> bool {
        let added = self.planets.insert(planet);
        if added {
            self.modified = now;
        }
        added
    }

    /// Drop a planet reference. False if it was not attached.
    pub fn detach_planet(&mut self, planet: &PlanetId, now: Timestamp) -> bool {
        let removed = self.planets.remove(planet);
        if removed {
            self.modified = now;
        }
        removed
    }

    pub fn has_planet(&self, planet: &PlanetId) -> bool {
        self.planets.contains(planet)
    }

    /// Attached planet ids, sorted.
    pub fn planet_ids(&self) -> impl Iterator<Item = &PlanetId> {
        self.planets.iter()
    }

    /// Ranking score: log-scaled `score` plus a time bonus that grows with
    /// the creation date. Rounded to 7 decimals.
    pub fn hot(&self, score: f64) -> f64 {
        let order = score.abs().max(1.0).log10();
        let sign = if score > 0.0 {
            1.0
        } else if score < 0.0 {
            -1.0
        } else {
            0.0
        };
        let raw = order + sign * self.created.ranking_seconds() / HOT_DECAY_SECS;
        (raw * 1e7).round() / 1e7
    }

    fn preview(&self) -> String {
        if self.text.chars().count() <= PREVIEW_LEN {
            self.text.clone()
        } else {
            let head: String = self.text.chars().take(PREVIEW_LEN - 2).collect();
            format!("{head}..")
        }
    }
}

impl fmt::Display for Star {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Star {}: {}>", self.creator_id.short(), self.preview())
    }
}

/// A vote by a Persona on a Star.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Oneup {
    pub id: OneupId,
    pub created: Timestamp,
    pub modified: Timestamp,
    state: OneupState,
    creator_id: PersonaId,
    star_id: StarId,
}

impl Oneup {
    /// A new active vote.
    pub fn new(id: OneupId, creator_id: PersonaId, star_id: StarId, now: Timestamp) -> Self {
        Self {
            id,
            created: now,
            modified: now,
            state: OneupState::Active,
            creator_id,
            star_id,
        }
    }

    pub fn restore(
        id: OneupId,
        created: Timestamp,
        modified: Timestamp,
        state: OneupState,
        creator_id: PersonaId,
        star_id: StarId,
    ) -> Self {
        Self {
            id,
            created,
            modified,
            state,
            creator_id,
            star_id,
        }
    }

    pub fn creator_id(&self) -> &PersonaId {
        &self.creator_id
    }

    pub fn star_id(&self) -> &StarId {
        &self.star_id
    }

    pub fn state(&self) -> OneupState {
        self.state
    }

    pub fn get_state(&self) -> &'static str {
        self.state.label()
    }

    /// Replace the state. The unknown-creator sentinel is rejected.
    pub fn set_state(&mut self, code: i64) -> Result<()> {
        self.state = OneupState::validate("oneup", code)?;
        Ok(())
    }

    /// Flip active to disabled, anything else to active.
    pub fn flip(&mut self, now: Timestamp) {
        self.state = self.state.toggled();
        self.modified = now;
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }
}

impl fmt::Display for Oneup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<1up <Persona {}> -> <Star {}> ({})>",
            self.creator_id.short(),
            self.star_id.short(),
            self.state
        )
    }
}

impl Export for Oneup {
    const DEFAULT_FIELDS: &'static [&'static str] =
        &["id", "created", "modified", "state", "creator_id", "star_id"];

    fn field(&self, name: &str) -> Option<ExportValue> {
        let value: ExportValue = match name {
            "id" => self.id.to_string().into(),
            "created" => self.created.into(),
            "modified" => self.modified.into(),
            "state" => self.state.code().into(),
            "creator_id" => self.creator_id.to_string().into(),
            "star_id" => self.star_id.to_string().into(),
            _ => return None,
        };
        Some(value)
    }
}

/// Kind-specific payload of a Planet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanetKind {
    Picture { filename: String },
    Link { url: String },
}

impl PlanetKind {
    /// The kind discriminator.
    pub fn name(&self) -> &'static str {
        match self {
            PlanetKind::Picture { .. } => "picture",
            PlanetKind::Link { .. } => "link",
        }
    }
}

/// An attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Planet {
    pub id: PlanetId,
    pub title: Option<String>,
    pub created: Timestamp,
    pub modified: Timestamp,
    /// Where the attachment came from.
    pub source: Option<String>,
    state: ContentState,
    kind: PlanetKind,
}

impl Planet {
    fn with_kind(id: PlanetId, title: Option<String>, kind: PlanetKind, now: Timestamp) -> Self {
        Self {
            id,
            title,
            created: now,
            modified: now,
            source: None,
            state: ContentState::Published,
            kind,
        }
    }

    pub fn picture(
        id: PlanetId,
        title: Option<String>,
        filename: impl Into<String>,
        now: Timestamp,
    ) -> Self {
        let kind = PlanetKind::Picture {
            filename: filename.into(),
        };
        Self::with_kind(id, title, kind, now)
    }

    pub fn link(id: PlanetId, title: Option<String>, url: impl Into<String>, now: Timestamp) -> Self {
        let kind = PlanetKind::Link { url: url.into() };
        Self::with_kind(id, title, kind, now)
    }

    pub fn restore(
        id: PlanetId,
        title: Option<String>,
        kind: PlanetKind,
        created: Timestamp,
        modified: Timestamp,
        state: ContentState,
        source: Option<String>,
    ) -> Self {
        Self {
            id,
            title,
            created,
            modified,
            source,
            state,
            kind,
        }
    }

    pub fn kind(&self) -> &PlanetKind {
        &self.kind
    }

    pub fn state(&self) -> ContentState {
        self.state
    }

    pub fn get_state(&self) -> &'static str {
        self.state.label()
    }

    pub fn set_state(&mut self, code: i64) -> Result<()> {
        self.state = ContentState::validate("planet", code)?;
        Ok(())
    }

    /// The `{id, modified}` summary nested in star exports.
    pub fn summary(&self) -> ExportMap {
        ExportMap::new()
            .with("id", self.id.to_string())
            .with("modified", self.modified)
    }
}

impl fmt::Display for Planet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Planet:{} [{}]>", self.kind.name(), self.id.short())
    }
}

impl Export for Planet {
    const DEFAULT_FIELDS: &'static [&'static str] =
        &["id", "title", "kind", "created", "modified", "source"];

    fn field(&self, name: &str) -> Option<ExportValue> {
        let value: ExportValue = match name {
            "id" => self.id.to_string().into(),
            "title" => self.title.clone().into(),
            "kind" => self.kind.name().into(),
            "created" => self.created.into(),
            "modified" => self.modified.into(),
            "source" => self.source.clone().into(),
            "state" => self.state.code().into(),
            _ => return None,
        };
        Some(value)
    }

    fn extend_export(&self, map: &mut ExportMap) {
        match &self.kind {
            PlanetKind::Picture { filename } => map.insert("filename", filename.as_str()),
            PlanetKind::Link { url } => map.insert("url", url.as_str()),
        }
    }
}

/// A star together with its resolved planets, ready for export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StarView {
    pub star: Star,
    pub planets: Vec<Planet>,
}

impl StarView {
    /// Pair a star with planets. Planets the star does not reference are
    /// dropped and the rest are ordered by id.
    pub fn new(star: Star, planets: impl IntoIterator<Item = Planet>) -> Self {
        let mut planets: Vec<Planet> = planets
            .into_iter()
            .filter(|p| star.has_planet(&p.id))
            .collect();
        planets.sort_by(|a, b| a.id.cmp(&b.id));
        planets.dedup_by(|a, b| a.id == b.id);
        Self { star, planets }
    }

    /// Planet summaries as nested in exports.
    pub fn planet_summaries(&self) -> Vec<ExportMap> {
        self.planets.iter().map(Planet::summary).collect()
    }
}

impl Export for StarView {
    const DEFAULT_FIELDS: &'static [&'static str] =
        &["id", "text", "created", "modified", "creator_id"];

    fn field(&self, name: &str) -> Option<ExportValue> {
        let star = &self.star;
        let value: ExportValue = match name {
            "id" => star.id.to_string().into(),
            "text" => star.text.as_str().into(),
            "created" => star.created.into(),
            "modified" => star.modified.into(),
            "creator_id" => star.creator_id.to_string().into(),
            "state" => star.state.code().into(),
            _ => return None,
        };
        Some(value)
    }

    fn extend_export(&self, map: &mut ExportMap) {
        map.insert("planets", self.planet_summaries());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::export::ExportOptions;
    use crate::types::RANKING_EPOCH_SECS;
    use proptest::prelude::*;

    fn creator() -> PersonaId {
        PersonaId::parse("aaaaaa00000000000000000000000000").unwrap()
    }

    fn star(text: &str) -> Star {
        Star::new(StarId::generate(), text, creator(), Timestamp::from_millis(1_000))
    }

    #[test]
    fn test_new_star_is_published() {
        let s = star("hello");
        assert_eq!(s.get_state(), "published");
        assert_eq!(s.creator_id(), &creator());
        assert_eq!(s.created, s.modified);
    }

    #[test]
    fn test_invalid_state_leaves_star_unchanged() {
        let mut s = star("hello");
        s.set_state(1).unwrap();
        let err = s.set_state(9).unwrap_err();
        assert!(matches!(err, CoreError::InvalidState { entity: "star", code: 9 }));
        assert_eq!(s.get_state(), "draft");
    }

    #[test]
    fn test_any_transition_allowed() {
        let mut s = star("hello");
        s.set_state(-2).unwrap();
        s.set_state(0).unwrap();
        assert_eq!(s.get_state(), "published");
    }

    #[test]
    fn test_display_truncates() {
        let short = star("hello");
        assert_eq!(short.to_string(), "<Star aaaaaa: hello>");
        let long = star("abcdefghijklmnopqrstuvwxyz0123");
        assert_eq!(long.to_string(), "<Star aaaaaa: abcdefghijklmnopqrstuv..>");
    }

    #[test]
    fn test_planet_attachment() {
        let mut s = star("hello");
        let p = PlanetId::generate();
        let later = Timestamp::from_millis(2_000);
        assert!(s.attach_planet(p.clone(), later));
        assert!(!s.attach_planet(p.clone(), later));
        assert!(s.has_planet(&p));
        assert_eq!(s.modified, later);
        assert!(s.detach_planet(&p, later));
        assert!(!s.has_planet(&p));
    }

    #[test]
    fn test_hot_score() {
        let s = Star::new(
            StarId::generate(),
            "x",
            creator(),
            Timestamp::from_millis((RANKING_EPOCH_SECS + 45_000) * 1000),
        );
        assert_eq!(s.hot(1.0), 1.0);
        assert_eq!(s.hot(100.0), 3.0);
        assert_eq!(s.hot(0.0), 0.0);
        assert_eq!(s.hot(-10.0), 0.0);
    }

    #[test]
    fn test_oneup_flip_and_sentinel() {
        let mut o = Oneup::new(OneupId::generate(), creator(), StarId::generate(), Timestamp::now());
        assert!(o.is_active());
        o.flip(Timestamp::now());
        assert_eq!(o.get_state(), "disabled");
        o.flip(Timestamp::now());
        assert!(o.is_active());
        assert!(o.set_state(OneupState::UNKNOWN_CREATOR_CODE).is_err());
        assert!(o.is_active());
    }

    #[test]
    fn test_oneup_display() {
        let star_id = StarId::parse("bbbbbb00000000000000000000000000").unwrap();
        let o = Oneup::new(OneupId::generate(), creator(), star_id, Timestamp::now());
        assert_eq!(o.to_string(), "<1up <Persona aaaaaa> -> <Star bbbbbb> (active)>");
    }

    #[test]
    fn test_oneup_export_state_is_code() {
        let mut o = Oneup::new(OneupId::generate(), creator(), StarId::generate(), Timestamp::now());
        o.flip(Timestamp::now());
        let map = o.export(&ExportOptions::new());
        assert_eq!(map.text("state"), Some("-1"));
    }

    #[test]
    fn test_picture_export_appends_filename() {
        let p = Planet::picture(
            PlanetId::generate(),
            Some("cat".into()),
            "cat.png",
            Timestamp::from_millis(0),
        );
        let map = p.export(&ExportOptions::new());
        let keys: Vec<_> = map.keys().collect();
        assert_eq!(
            keys,
            vec!["id", "title", "kind", "created", "modified", "source", "filename"]
        );
        assert_eq!(map.text("kind"), Some("picture"));
        assert_eq!(map.text("filename"), Some("cat.png"));
    }

    #[test]
    fn test_link_export_appends_url() {
        let p = Planet::link(PlanetId::generate(), None, "https://example.org", Timestamp::now());
        let map = p.export(&ExportOptions::new().exclude("source"));
        assert_eq!(map.keys().last(), Some("url"));
        assert!(!map.contains_key("source"));
        assert!(!map.contains_key("filename"));
        assert_eq!(p.to_string(), format!("<Planet:link [{}]>", p.id.short()));
    }

    #[test]
    fn test_star_view_enumerates_planets() {
        let now = Timestamp::from_millis(3_000);
        let mut s = star("with pictures");
        let a = Planet::picture(PlanetId::generate(), None, "a.png", now);
        let b = Planet::link(PlanetId::generate(), None, "https://b", now);
        let stray = Planet::link(PlanetId::generate(), None, "https://stray", now);
        s.attach_planet(a.id.clone(), now);
        s.attach_planet(b.id.clone(), now);

        let view = StarView::new(s, vec![stray, b.clone(), a.clone()]);
        assert_eq!(view.planets.len(), 2);

        let map = view.export(&ExportOptions::new());
        let keys: Vec<_> = map.keys().collect();
        assert_eq!(
            keys,
            vec!["id", "text", "created", "modified", "creator_id", "planets"]
        );
        let planets = map.get("planets").unwrap().as_list().unwrap();
        assert_eq!(planets.len(), 2);
        for entry in planets {
            assert!(entry.contains_key("id"));
            assert_eq!(entry.text("modified"), Some("1970-01-01T00:00:03.000Z"));
        }
    }

    #[test]
    fn test_star_view_planets_survive_exclude() {
        let view = StarView::new(star("x"), Vec::new());
        let map = view.export(&ExportOptions::new().exclude("planets"));
        assert!(map.contains_key("planets"));
    }

    proptest! {
        #[test]
        fn prop_set_state_label(code in -2i64..=3) {
            let mut s = star("p");
            s.set_state(code).unwrap();
            let expected = ContentState::from_code(code).unwrap().label();
            prop_assert_eq!(s.get_state(), expected);
        }

        #[test]
        fn prop_invalid_state_rejected(code in prop_oneof![-1000i64..-2, 4i64..1000]) {
            let mut p = Planet::link(PlanetId::generate(), None, "u", Timestamp::now());
            p.set_state(2).unwrap();
            prop_assert!(p.set_state(code).is_err());
            prop_assert_eq!(p.get_state(), "private");
        }

        #[test]
        fn prop_flip_parity(n in 1usize..20) {
            let mut o = Oneup::new(OneupId::generate(), creator(), StarId::generate(), Timestamp::now());
            for _ in 1..n {
                o.flip(Timestamp::now());
            }
            prop_assert_eq!(o.is_active(), n % 2 == 1);
        }
    }
}
