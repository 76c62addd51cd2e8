//! Meeting name generation.
//!
//! Produces the human-visible meeting identifier that also becomes the room
//! slug. Randomness comes from `ring::rand::SystemRandom`; a CSPRNG failure
//! degrades to the UUID strategy instead of failing the request.

use crate::models::{ChannelType, NamingScheme};
use ring::error::Unspecified;
use ring::rand::{SecureRandom, SystemRandom};

/// Topic used when the requester gave none.
pub const DEFAULT_MEETING_TOPIC: &str = "DigitalSamba Meeting";

/// Give up on rejection sampling after this many draws.
const MAX_SAMPLE_ATTEMPTS: usize = 16;

/// What the generator knows about the request.
#[derive(Debug, Clone, Copy)]
pub struct NamingContext<'a> {
    pub username: &'a str,
    pub channel_type: ChannelType,
    pub channel_name: &'a str,

    /// `None` when the channel's team could not be resolved.
    pub team_name: Option<&'a str>,

    pub topic: Option<&'a str>,
}

/// Generate a meeting identifier under `scheme`. Never fails.
///
/// `Ask` is not a generation strategy. Callers that can prompt handle it
/// before getting here; everyone else gets the topic-derived name, or random
/// words when the topic is missing or has no letters or digits left after
/// sanitizing.
pub fn generate(scheme: NamingScheme, ctx: &NamingContext<'_>) -> String {
    match scheme {
        NamingScheme::Words => random_words(),
        NamingScheme::Uuid => uuid_name(),
        NamingScheme::Mattermost => {
            if ctx.channel_type.is_conversation() {
                return personal_meeting_name(ctx.username);
            }
            match ctx.team_name {
                Some(team) => team_channel_name(team, ctx.channel_name),
                None => random_words(),
            }
        }
        NamingScheme::Ask => ctx
            .topic
            .map(sanitize)
            .filter(|name| name.chars().any(|c| c.is_ascii_alphanumeric()))
            .unwrap_or_else(random_words),
    }
}

/// Four capitalized random words, e.g. `BraveOttersPaintQuietly`.
pub fn random_words() -> String {
    let rng = SystemRandom::new();
    match try_random_words(&|buf: &mut [u8]| rng.fill(buf)) {
        Some(name) => name,
        None => {
            tracing::warn!(
                target: "ds.naming",
                "CSPRNG failed, falling back to UUID meeting name"
            );
            uuid_name()
        }
    }
}

/// Source of random bytes, e.g. `SystemRandom::fill`.
type Fill<'a> = dyn Fn(&mut [u8]) -> Result<(), Unspecified> + 'a;

fn try_random_words(fill: &Fill<'_>) -> Option<String> {
    let mut name = String::new();
    for list in [ADJECTIVES, NOUNS, VERBS, ADVERBS] {
        let index = uniform_index(fill, list.len())?;
        name.push_str(&capitalize(list.get(index)?));
    }
    Some(name)
}

/// Uniform index in `0..len`, by rejection sampling over `u32`.
fn uniform_index(fill: &Fill<'_>, len: usize) -> Option<usize> {
    let bound = u32::try_from(len).ok().filter(|b| *b > 0)?;
    // Values below this threshold would bias the modulo.
    let threshold = bound.wrapping_neg() % bound;

    for _ in 0..MAX_SAMPLE_ATTEMPTS {
        let mut bytes = [0u8; 4];
        fill(&mut bytes).ok()?;
        let value = u32::from_le_bytes(bytes);
        if value >= threshold {
            return usize::try_from(value % bound).ok();
        }
    }
    None
}

/// Canonical hyphenated v4 UUID.
pub fn uuid_name() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn personal_meeting_name(username: &str) -> String {
    format!("{}-personal-meeting", username)
}

pub fn team_channel_name(team_name: &str, channel_name: &str) -> String {
    format!("{}-{}-meeting", sanitize(team_name), sanitize(channel_name))
}

/// Spaces become `-`; anything outside `[A-Za-z0-9_-]` is dropped.
pub fn sanitize(input: &str) -> String {
    input
        .chars()
        .map(|c| if c == ' ' { '-' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

/// Uppercase the first character and leave the rest alone.
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

const ADJECTIVES: &[&str] = &[
    "amber", "ancient", "bold", "brave", "breezy", "bright", "calm", "clever", "cosmic", "crisp",
    "curious", "daring", "dusty", "eager", "electric", "fancy", "fearless", "gentle", "giant",
    "golden", "graceful", "happy", "hidden", "honest", "humble", "jolly", "keen", "lively",
    "lucky", "mellow", "merry", "mighty", "misty", "nimble", "noble", "patient", "playful",
    "polite", "proud", "quick", "quiet", "rapid", "rustic", "silent", "silver", "sleepy",
    "smooth", "snowy", "steady", "sunny", "swift", "tidy", "tiny", "vivid", "wandering", "warm",
    "wild", "wise", "witty", "zesty",
];

const NOUNS: &[&str] = &[
    "badgers", "beavers", "bees", "bisons", "camels", "cats", "cheetahs", "comets", "cranes",
    "dolphins", "dragons", "eagles", "falcons", "ferrets", "foxes", "geckos", "giraffes",
    "hawks", "hedgehogs", "herons", "horses", "koalas", "lemurs", "lions", "llamas", "lynxes",
    "meerkats", "moose", "narwhals", "newts", "otters", "owls", "pandas", "parrots", "pelicans",
    "penguins", "planets", "puffins", "rabbits", "ravens", "rivers", "robins", "salmon",
    "seals", "sparrows", "squirrels", "storks", "swans", "tigers", "toucans", "turtles",
    "walruses", "whales", "wolves", "wombats", "yaks", "zebras",
];

const VERBS: &[&str] = &[
    "admire", "bake", "balance", "build", "carry", "chase", "climb", "collect", "cook", "dance",
    "design", "discover", "draw", "dream", "explore", "fetch", "fly", "gather", "glide", "greet",
    "guard", "hum", "imagine", "invent", "juggle", "jump", "knit", "laugh", "learn", "listen",
    "march", "measure", "mend", "paint", "play", "ponder", "race", "read", "relax", "ride",
    "roam", "sail", "sing", "sketch", "skate", "sparkle", "swim", "teach", "travel", "visit",
    "wander", "watch", "whistle", "write",
];

const ADVERBS: &[&str] = &[
    "boldly", "brightly", "briskly", "calmly", "carefully", "cheerfully", "clearly", "closely",
    "deftly", "eagerly", "easily", "elegantly", "evenly", "fairly", "fondly", "freely",
    "gently", "gladly", "gracefully", "happily", "honestly", "kindly", "lazily", "lightly",
    "loudly", "merrily", "neatly", "nicely", "openly", "patiently", "politely", "proudly",
    "quickly", "quietly", "rapidly", "safely", "silently", "slowly", "smoothly", "softly",
    "steadily", "swiftly", "tenderly", "thoughtfully", "truly", "warmly", "wildly", "wisely",
];
