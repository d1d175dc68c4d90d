//! Starmaps: author-scoped ordered indexes of Stars.
//!
//! Containment and length are derived from the index alone. A starmap never
//! owns the stars it references; removing an entry only drops the reference.

use std::fmt;

use crate::content::{Star, StarView};
use crate::export::{Export, ExportMap, ExportValue};
use crate::types::{PersonaId, StarId, StarmapId, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Starmap {
    pub id: StarmapId,
    pub modified: Timestamp,
    /// `None` for anonymous or system maps.
    pub author_id: Option<PersonaId>,
    index: Vec<StarId>,
}

impl Starmap {
    pub fn new(id: StarmapId, author_id: Option<PersonaId>, now: Timestamp) -> Self {
        Self {
            id,
            modified: now,
            author_id,
            index: Vec::new(),
        }
    }

    /// Rebuild from stored fields. Duplicate ids keep their first position.
    pub fn restore(
        id: StarmapId,
        author_id: Option<PersonaId>,
        modified: Timestamp,
        index: impl IntoIterator<Item = StarId>,
    ) -> Self {
        let mut map = Self::new(id, author_id, modified);
        for star in index {
            if !map.index.contains(&star) {
                map.index.push(star);
            }
        }
        map
    }

    pub fn contains(&self, star: &StarId) -> bool {
        self.index.contains(star)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Ordered star references.
    pub fn index(&self) -> &[StarId] {
        &self.index
    }

    /// Append a star reference. False if already indexed.
    ///
    /// No ownership check is made here.
    pub fn add(&mut self, star: StarId, now: Timestamp) -> bool {
        if self.contains(&star) {
            return false;
        }
        self.index.push(star);
        self.modified = now;
        true
    }

    /// Drop a star reference. The star itself is untouched.
    pub fn remove(&mut self, star: &StarId, now: Timestamp) -> bool {
        let Some(pos) = self.index.iter().position(|s| s == star) else {
            return false;
        };
        self.index.remove(pos);
        self.modified = now;
        true
    }

    /// Filter resolved stars down to those written by `author`, keeping
    /// index order.
    pub fn authored_by<'a>(
        &self,
        stars: &'a [Star],
        author: &PersonaId,
    ) -> Vec<&'a Star> {
        self.index
            .iter()
            .filter_map(|id| stars.iter().find(|s| &s.id == id))
            .filter(|s| s.creator_id() == author)
            .collect()
    }
}

impl fmt::Display for Starmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.author_id {
            Some(author) => write!(f, "<Starmap {} by {}>", self.id.short(), author.short()),
            None => write!(f, "<Starmap {}>", self.id.short()),
        }
    }
}

/// A starmap with its entries resolved, ready for export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StarmapView {
    pub starmap: Starmap,
    pub entries: Vec<StarView>,
}

impl StarmapView {
    /// Order `entries` by the starmap's index. Stars missing from the index
    /// are dropped; indexed stars missing from `entries` are skipped.
    pub fn new(starmap: Starmap, entries: impl IntoIterator<Item = StarView>) -> Self {
        let mut pool: Vec<StarView> = entries.into_iter().collect();
        let mut ordered = Vec::with_capacity(starmap.len());
        for id in starmap.index() {
            if let Some(pos) = pool.iter().position(|v| &v.star.id == id) {
                ordered.push(pool.swap_remove(pos));
            }
        }
        Self {
            starmap,
            entries: ordered,
        }
    }

    fn entry_summary(view: &StarView) -> ExportMap {
        ExportMap::new()
            .with("id", view.star.id.to_string())
            .with("creator_id", view.star.creator_id().to_string())
            .with("modified", view.star.modified)
            .with("planets", view.planet_summaries())
    }
}

impl Export for StarmapView {
    const DEFAULT_FIELDS: &'static [&'static str] = &["id", "modified", "author_id"];

    fn field(&self, name: &str) -> Option<ExportValue> {
        let map = &self.starmap;
        let value: ExportValue = match name {
            "id" => map.id.to_string().into(),
            "modified" => map.modified.into(),
            "author_id" => map.author_id.as_ref().map(|a| a.to_string()).into(),
            "length" => (map.len() as i64).into(),
            _ => return None,
        };
        Some(value)
    }

    fn extend_export(&self, map: &mut ExportMap) {
        let index = self.entries.iter().map(Self::entry_summary).collect::<Vec<_>>();
        map.insert("index", index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Planet;
    use crate::export::ExportOptions;
    use crate::types::PlanetId;

    fn ts(ms: i64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    #[test]
    fn test_len_contains_remove() {
        let s1 = StarId::generate();
        let s2 = StarId::generate();
        let mut m = Starmap::new(StarmapId::generate(), None, ts(0));
        assert!(m.is_empty());
        m.add(s1.clone(), ts(1));
        m.add(s2.clone(), ts(2));
        assert_eq!(m.len(), 2);
        assert!(m.contains(&s1));

        assert!(m.remove(&s2, ts(3)));
        assert_eq!(m.len(), 1);
        assert!(!m.contains(&s2));
        assert_eq!(m.modified, ts(3));
    }

    #[test]
    fn test_add_is_idempotent() {
        let s = StarId::generate();
        let mut m = Starmap::new(StarmapId::generate(), None, ts(0));
        assert!(m.add(s.clone(), ts(1)));
        assert!(!m.add(s.clone(), ts(2)));
        assert_eq!(m.len(), 1);
        assert_eq!(m.modified, ts(1));
        assert!(!m.remove(&StarId::generate(), ts(3)));
    }

    #[test]
    fn test_restore_dedupes() {
        let s = StarId::generate();
        let m = Starmap::restore(StarmapId::generate(), None, ts(0), vec![s.clone(), s]);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn test_authored_by_filters_at_query_time() {
        let alice = PersonaId::generate();
        let bob = PersonaId::generate();
        let a = Star::new(StarId::generate(), "a", alice.clone(), ts(0));
        let b = Star::new(StarId::generate(), "b", bob.clone(), ts(0));

        let mut m = Starmap::new(StarmapId::generate(), Some(alice.clone()), ts(0));
        m.add(b.id.clone(), ts(1));
        m.add(a.id.clone(), ts(2));
        assert_eq!(m.len(), 2);

        let stars = vec![a.clone(), b];
        let mine = m.authored_by(&stars, &alice);
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, a.id);
    }

    #[test]
    fn test_view_export_enumerates_entries_in_order() {
        let author = PersonaId::generate();
        let mut first = Star::new(StarId::generate(), "first", author.clone(), ts(10));
        let second = Star::new(StarId::generate(), "second", author.clone(), ts(20));
        let planet = Planet::link(PlanetId::generate(), None, "https://x", ts(15));
        first.attach_planet(planet.id.clone(), ts(15));

        let mut m = Starmap::new(StarmapId::generate(), Some(author.clone()), ts(0));
        m.add(first.id.clone(), ts(30));
        m.add(second.id.clone(), ts(31));

        let views = vec![
            StarView::new(second.clone(), Vec::new()),
            StarView::new(first.clone(), vec![planet]),
        ];
        let view = StarmapView::new(m, views);
        let map = view.export(&ExportOptions::new());

        let keys: Vec<_> = map.keys().collect();
        assert_eq!(keys, vec!["id", "modified", "author_id", "index"]);
        assert_eq!(map.text("author_id"), Some(author.as_str()));

        let index = map.get("index").unwrap().as_list().unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index[0].text("id"), Some(first.id.as_str()));
        assert_eq!(index[0].text("creator_id"), Some(author.as_str()));
        assert_eq!(index[0].text("modified"), Some("1970-01-01T00:00:00.015Z"));
        assert_eq!(index[0].get("planets").unwrap().as_list().unwrap().len(), 1);
        assert_eq!(index[1].text("id"), Some(second.id.as_str()));
    }

    #[test]
    fn test_anonymous_map_exports_null_author() {
        let view = StarmapView::new(Starmap::new(StarmapId::generate(), None, ts(0)), Vec::new());
        let json = view.export(&ExportOptions::new()).to_json_string().unwrap();
        assert!(json.contains(r#""author_id":null"#));
        assert!(json.ends_with(r#""index":[]}"#));
    }
}
