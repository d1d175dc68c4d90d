//! Proptest generators for property-based testing.

use proptest::prelude::*;

use souma_core::{
    ContentState, OneupState, PersonaId, Planet, PlanetId, Star, StarId, StateCode, Timestamp,
};

fn hex_id() -> impl Strategy<Value = String> {
    any::<[u8; 16]>().prop_map(hex::encode)
}

/// Generate a random PersonaId.
pub fn persona_id() -> impl Strategy<Value = PersonaId> {
    hex_id().prop_map(|s| PersonaId::parse(&s).expect("hex id"))
}

/// Generate a random StarId.
pub fn star_id() -> impl Strategy<Value = StarId> {
    hex_id().prop_map(|s| StarId::parse(&s).expect("hex id"))
}

/// Generate a random PlanetId.
pub fn planet_id() -> impl Strategy<Value = PlanetId> {
    hex_id().prop_map(|s| PlanetId::parse(&s).expect("hex id"))
}

/// Generate a timestamp between 1970 and 2100.
pub fn timestamp() -> impl Strategy<Value = Timestamp> {
    (0i64..=4_102_444_800_000i64).prop_map(Timestamp::from_millis)
}

/// Generate any content state.
pub fn content_state() -> impl Strategy<Value = ContentState> {
    prop::sample::select(ContentState::ALL.to_vec())
}

/// Generate a storable vote state.
pub fn oneup_state() -> impl Strategy<Value = OneupState> {
    prop_oneof![Just(OneupState::Active), Just(OneupState::Disabled)]
}

/// Generate a code that may or may not name a content state.
pub fn state_code() -> impl Strategy<Value = i64> {
    prop_oneof![
        content_state().prop_map(|state| state.code()),
        -100i64..=100i64,
    ]
}

/// Generate star text, including non-ASCII.
pub fn star_text() -> impl Strategy<Value = String> {
    "\\PC{0,80}".prop_map(String::from)
}

/// Generate a picture or link planet.
pub fn planet() -> impl Strategy<Value = Planet> {
    (
        planet_id(),
        proptest::option::of("[a-z ]{1,16}"),
        timestamp(),
        any::<bool>(),
        "[a-z0-9]{1,12}",
    )
        .prop_map(|(id, title, ts, picture, stem)| {
            if picture {
                Planet::picture(id, title, format!("{stem}.png"), ts)
            } else {
                Planet::link(id, title, format!("https://{stem}.example.org/"), ts)
            }
        })
}

/// Parameters for generating a star.
#[derive(Debug, Clone)]
pub struct StarParams {
    pub id: StarId,
    pub text: String,
    pub creator_id: PersonaId,
    pub created: Timestamp,
    pub state: ContentState,
    pub planets: Vec<PlanetId>,
}

impl Arbitrary for StarParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            star_id(),
            star_text(),
            persona_id(),
            timestamp(),
            content_state(),
            prop::collection::vec(planet_id(), 0..4),
        )
            .prop_map(|(id, text, creator_id, created, state, planets)| StarParams {
                id,
                text,
                creator_id,
                created,
                state,
                planets,
            })
            .boxed()
    }
}

/// Generate a star from parameters.
pub fn star_from_params(params: &StarParams) -> Star {
    Star::restore(
        params.id.clone(),
        params.text.clone(),
        params.created,
        params.created,
        params.state,
        params.creator_id.clone(),
        params.planets.iter().cloned(),
    )
}
