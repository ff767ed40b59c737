/// Static effect data: which voice lines and notification texts belong to
/// which event under which profile, plus the archives the voice lines come from.
///
/// Everything here is built once at startup and handed to the dispatcher, so
/// tests can run side by side with different catalogs.
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::DEFAULT_PROFILE;
use crate::event::{EventKind, HostEvent};

// ── Sound packs ────────────────────────────────────────────────────────────────

/// One remote zip archive and the entries to pull out of it.
#[derive(Debug, Clone)]
pub struct SoundPack {
    pub name: String,
    pub url: String,
    /// (path inside the archive, file name in the cache directory)
    pub files: Vec<(String, String)>,
}

impl SoundPack {
    pub fn new(name: &str, url: &str, files: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            files: files
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        }
    }
}

/// The StarCraft voice packs hosted on The Sounds Resource.
pub fn builtin_packs() -> Vec<SoundPack> {
    vec![
        SoundPack::new(
            "protoss-advisor",
            "https://sounds.spriters-resource.com/media/assets/416/419544.zip",
            &[
                ("advisor/paderr02.wav", "additional-pylons.wav"),
                ("advisor/paderr00.wav", "not-enough-minerals-protoss.wav"),
                ("advisor/paderr01.wav", "not-enough-vespene-gas.wav"),
            ],
        ),
        SoundPack::new(
            "terran-advisor",
            "https://sounds.spriters-resource.com/media/assets/416/419574.zip",
            &[
                ("advisor/taderr00.wav", "not-enough-minerals-terran.wav"),
                ("advisor/taderr04.wav", "nuclear-launch-detected.wav"),
                ("advisor/tadupd07.wav", "your-base-is-under-attack.wav"),
            ],
        ),
        SoundPack::new(
            "scv",
            "https://sounds.spriters-resource.com/media/assets/416/419592.zip",
            &[
                ("scv/tscrdy00.wav", "scv-ready.wav"),
                ("scv/tscyes00.wav", "scv-yes-sir.wav"),
                ("scv/tscyes02.wav", "scv-affirmative.wav"),
                ("scv/tscwht00.wav", "scv-whaddya-want.wav"),
                ("scv/tscwht01.wav", "scv-im-not-listening.wav"),
                ("scv/tscerr00.wav", "scv-cant-do-that.wav"),
                ("scv/tscdth00.wav", "scv-death.wav"),
                ("scv/tscpss00.wav", "scv-pissed-0.wav"),
            ],
        ),
    ]
}

/// Every cache file name the packs produce.
pub fn manifest(packs: &[SoundPack]) -> BTreeSet<String> {
    packs
        .iter()
        .flat_map(|p| p.files.iter().map(|(_, out)| out.clone()))
        .collect()
}

// ── Profiles ───────────────────────────────────────────────────────────────────

/// Title plus body template. `{detail}` in the body is replaced with text
/// pulled from the event payload (see [`detail_for`]).
#[derive(Debug, Clone, PartialEq)]
pub struct NoticeTemplate {
    pub title: String,
    pub body: String,
}

impl NoticeTemplate {
    pub fn new(title: &str, body: &str) -> Self {
        Self {
            title: title.to_string(),
            body: body.to_string(),
        }
    }

    /// Returns `(title, body)` with the detail substituted and the body clamped.
    pub fn render(&self, detail: &str, max_length: usize) -> (String, String) {
        let body = self.body.replace("{detail}", detail);
        (self.title.clone(), clamp_text(&body, max_length))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub sounds: BTreeMap<EventKind, Vec<String>>,
    pub notices: BTreeMap<EventKind, Vec<NoticeTemplate>>,
}

impl Profile {
    pub fn with_sounds(mut self, kind: EventKind, files: &[&str]) -> Self {
        self.sounds
            .insert(kind, files.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn with_notice(mut self, kind: EventKind, title: &str, body: &str) -> Self {
        self.notices
            .entry(kind)
            .or_default()
            .push(NoticeTemplate::new(title, body));
        self
    }
}

#[derive(Debug, Clone)]
pub struct Catalog {
    default_profile: String,
    profiles: BTreeMap<String, Profile>,
}

impl Catalog {
    pub fn new(default_profile: &str, profiles: BTreeMap<String, Profile>) -> Self {
        Self {
            default_profile: default_profile.to_string(),
            profiles,
        }
    }

    /// `classic`, `minimal` and `terran`; `classic` is the default.
    pub fn builtin() -> Self {
        use EventKind::*;

        let classic = Profile::default()
            .with_sounds(SessionIdle, &["scv-yes-sir.wav", "scv-affirmative.wav"])
            .with_sounds(SessionCreated, &["scv-ready.wav"])
            .with_sounds(SessionCompacted, &["additional-pylons.wav"])
            .with_sounds(
                SessionError,
                &[
                    "not-enough-minerals-protoss.wav",
                    "not-enough-minerals-terran.wav",
                    "not-enough-vespene-gas.wav",
                ],
            )
            .with_sounds(PermissionAsked, &["scv-whaddya-want.wav", "scv-im-not-listening.wav"])
            .with_notice(SessionCreated, "SCV ready", "SCV good to go, sir.")
            .with_notice(SessionIdle, "Job's finished", "Session idle, awaiting orders.")
            .with_notice(SessionIdle, "Affirmative", "Work complete.")
            .with_notice(SessionCompacted, "Additional pylons required", "Context compacted.")
            .with_notice(SessionError, "Not enough minerals", "{detail}")
            .with_notice(SessionError, "Not enough vespene gas", "{detail}")
            .with_notice(PermissionAsked, "Whaddya want?", "Permission requested: {detail}")
            .with_notice(QuestionAsked, "Awaiting orders", "{detail}");

        let minimal = Profile::default()
            .with_sounds(SessionIdle, &["scv-yes-sir.wav"])
            .with_sounds(SessionCreated, &[])
            .with_sounds(SessionError, &["not-enough-minerals-terran.wav"])
            .with_sounds(PermissionAsked, &["scv-whaddya-want.wav"])
            .with_notice(SessionIdle, "Done", "Session idle.")
            .with_notice(SessionError, "Error", "{detail}")
            .with_notice(PermissionAsked, "Permission", "{detail}")
            .with_notice(QuestionAsked, "Question", "{detail}");

        let terran = Profile::default()
            .with_sounds(SessionIdle, &["scv-yes-sir.wav", "scv-affirmative.wav"])
            .with_sounds(SessionCreated, &["scv-ready.wav"])
            .with_sounds(SessionCompacted, &["nuclear-launch-detected.wav"])
            .with_sounds(
                SessionError,
                &["not-enough-minerals-terran.wav", "scv-cant-do-that.wav", "scv-pissed-0.wav"],
            )
            .with_sounds(PermissionAsked, &["scv-whaddya-want.wav", "scv-im-not-listening.wav"])
            .with_sounds(QuestionAsked, &["your-base-is-under-attack.wav"])
            .with_notice(SessionCreated, "SCV ready", "Reporting for duty.")
            .with_notice(SessionIdle, "Yes sir", "Session idle.")
            .with_notice(SessionCompacted, "Nuclear launch detected", "Context compacted.")
            .with_notice(SessionError, "Can't do that", "{detail}")
            .with_notice(PermissionAsked, "Whaddya want?", "{detail}")
            .with_notice(QuestionAsked, "Your base is under attack", "{detail}");

        let profiles = [("classic", classic), ("minimal", minimal), ("terran", terran)]
            .into_iter()
            .map(|(name, p)| (name.to_string(), p))
            .collect();
        Self::new(DEFAULT_PROFILE, profiles)
    }

    pub fn profile_names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Returns `requested` when it names a known profile, otherwise the default name.
    pub fn resolve_profile<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        match requested {
            Some(name) if self.profiles.contains_key(name) => name,
            _ => &self.default_profile,
        }
    }

    fn profile(&self, requested: Option<&str>) -> Option<&Profile> {
        self.profiles.get(self.resolve_profile(requested))
    }

    /// Candidate sound files for `event_type`. Empty means "no sound", not an error.
    pub fn resolve_effects(&self, profile: Option<&str>, event_type: &str) -> &[String] {
        let Some(kind) = EventKind::from_type(event_type) else {
            return &[];
        };
        self.profile(profile)
            .and_then(|p| p.sounds.get(&kind))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Candidate notification templates for `event_type`.
    pub fn resolve_notices(&self, profile: Option<&str>, event_type: &str) -> &[NoticeTemplate] {
        let Some(kind) = EventKind::from_type(event_type) else {
            return &[];
        };
        self.profile(profile)
            .and_then(|p| p.notices.get(&kind))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

// ── Selection ──────────────────────────────────────────────────────────────────

/// Uniform pick from `candidates`. Each call is independent; repeats are allowed.
pub fn pick<'a, T, R: Rng + ?Sized>(candidates: &'a [T], rng: &mut R) -> Option<&'a T> {
    candidates.choose(rng)
}

// ── Notification text ──────────────────────────────────────────────────────────

const ELLIPSIS: char = '…';

/// Human-readable detail for events that carry a structured payload.
pub fn detail_for(event: &HostEvent) -> String {
    let detail = match event.kind() {
        Some(EventKind::SessionError) => event.error_summary().unwrap_or("Unknown error"),
        Some(EventKind::PermissionAsked) => {
            event.permission_summary().unwrap_or("Permission requested")
        }
        Some(EventKind::QuestionAsked) => event.question_summary().unwrap_or("Question pending"),
        _ => "",
    };
    detail.to_string()
}

/// Collapses whitespace runs to single spaces, then cuts to `max_length`
/// characters, the last of which becomes an ellipsis when anything was dropped.
pub fn clamp_text(text: &str, max_length: usize) -> String {
    let max_length = max_length.max(1);
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_length {
        return collapsed;
    }
    let mut out: String = collapsed.chars().take(max_length - 1).collect();
    out.push(ELLIPSIS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    // ── packs ─────────────────────────────────────────────────────────────────

    #[test]
    fn builtin_pack_output_names_are_unique() {
        let packs = builtin_packs();
        let total: usize = packs.iter().map(|p| p.files.len()).sum();
        assert_eq!(manifest(&packs).len(), total);
    }

    #[test]
    fn every_builtin_sound_is_provisioned_by_a_pack() {
        let names = manifest(&builtin_packs());
        let catalog = Catalog::builtin();
        for profile in catalog.profile_names() {
            for kind in EventKind::ALL {
                for sound in catalog.resolve_effects(Some(profile), kind.as_str()) {
                    assert!(names.contains(sound), "{profile}/{}: {sound}", kind.as_str());
                }
            }
        }
    }

    // ── resolve_profile ───────────────────────────────────────────────────────

    #[test]
    fn resolve_profile_keeps_known_names() {
        let catalog = Catalog::builtin();
        for name in ["classic", "minimal", "terran"] {
            assert_eq!(catalog.resolve_profile(Some(name)), name);
        }
    }

    #[test]
    fn resolve_profile_falls_back_to_default() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.resolve_profile(None), DEFAULT_PROFILE);
        assert_eq!(catalog.resolve_profile(Some("zerg")), DEFAULT_PROFILE);
        assert_eq!(catalog.resolve_profile(Some("")), DEFAULT_PROFILE);
        assert_eq!(catalog.resolve_profile(Some("Minimal")), DEFAULT_PROFILE);
    }

    // ── resolve_effects ───────────────────────────────────────────────────────

    #[test]
    fn resolve_effects_unknown_event_is_empty() {
        let catalog = Catalog::builtin();
        for profile in ["classic", "minimal", "terran"] {
            assert!(catalog.resolve_effects(Some(profile), "message.updated").is_empty());
        }
    }

    #[test]
    fn resolve_effects_missing_or_empty_entry_is_empty() {
        let catalog = Catalog::builtin();
        // classic has no question.asked entry, minimal maps session.created to [].
        assert!(catalog.resolve_effects(Some("classic"), "question.asked").is_empty());
        assert!(catalog.resolve_effects(Some("minimal"), "session.created").is_empty());
    }

    #[test]
    fn resolve_effects_minimal_permission_is_single_candidate() {
        let catalog = Catalog::builtin();
        assert_eq!(
            catalog.resolve_effects(Some("minimal"), "permission.asked"),
            ["scv-whaddya-want.wav".to_string()]
        );
    }

    #[test]
    fn resolve_effects_unknown_profile_uses_default_table() {
        let catalog = Catalog::builtin();
        assert_eq!(
            catalog.resolve_effects(Some("zerg"), "session.compacted"),
            catalog.resolve_effects(Some("classic"), "session.compacted")
        );
    }

    #[test]
    fn separate_catalogs_do_not_share_tables() {
        let custom = Catalog::new(
            "solo",
            [(
                "solo".to_string(),
                Profile::default().with_sounds(EventKind::SessionIdle, &["beep.wav"]),
            )]
            .into_iter()
            .collect(),
        );
        assert_eq!(custom.resolve_effects(None, "session.idle"), ["beep.wav".to_string()]);
        assert_eq!(Catalog::builtin().resolve_effects(None, "session.idle").len(), 2);
    }

    // ── pick ──────────────────────────────────────────────────────────────────

    #[test]
    fn pick_empty_is_none() {
        let mut rng = StdRng::seed_from_u64(1);
        let empty: [String; 0] = [];
        assert!(pick(&empty, &mut rng).is_none());
    }

    #[test]
    fn pick_is_reproducible_for_a_seed_and_stays_in_range() {
        let candidates = ["a", "b", "c"];
        let mut first = StdRng::seed_from_u64(7);
        let mut second = StdRng::seed_from_u64(7);
        let a: Vec<_> = (0..20).map(|_| *pick(&candidates, &mut first).unwrap()).collect();
        let b: Vec<_> = (0..20).map(|_| *pick(&candidates, &mut second).unwrap()).collect();
        assert_eq!(a, b);
        assert!(a.iter().all(|c| candidates.contains(c)));
    }

    #[test]
    fn pick_eventually_reaches_every_candidate() {
        let candidates = ["a", "b", "c"];
        let mut rng = StdRng::seed_from_u64(42);
        let seen: BTreeSet<_> = (0..200).map(|_| *pick(&candidates, &mut rng).unwrap()).collect();
        assert_eq!(seen.len(), 3);
    }

    // ── text ──────────────────────────────────────────────────────────────────

    #[test]
    fn clamp_text_collapses_whitespace_under_limit() {
        assert_eq!(clamp_text("  disk \n\t full  ", 20), "disk full");
    }

    #[test]
    fn clamp_text_at_limit_is_unchanged() {
        assert_eq!(clamp_text("abcde", 5), "abcde");
    }

    #[test]
    fn clamp_text_over_limit_gets_ellipsis() {
        let out = clamp_text("abcdefgh", 5);
        assert_eq!(out, "abcd…");
        assert_eq!(out.chars().count(), 5);
    }

    #[test]
    fn clamp_text_measures_after_collapsing() {
        // 11 chars raw, 7 after collapsing.
        assert_eq!(clamp_text("ab    cd ef", 8), "ab cd ef");
    }

    #[test]
    fn clamp_text_counts_chars_not_bytes() {
        assert_eq!(clamp_text("ééééé", 5), "ééééé");
        assert_eq!(clamp_text("éééééé", 5), "éééé…");
    }

    #[test]
    fn detail_for_error_uses_fallback_chain() {
        let with_message = HostEvent::new(
            "session.error",
            json!({"error": {"name": "APIError", "data": {"message": "rate limited"}}}),
        );
        assert_eq!(detail_for(&with_message), "rate limited");

        let bare = HostEvent::new("session.error", json!({}));
        assert_eq!(detail_for(&bare), "Unknown error");
    }

    #[test]
    fn detail_for_plain_events_is_empty() {
        assert_eq!(detail_for(&HostEvent::new("session.idle", json!({}))), "");
        assert_eq!(detail_for(&HostEvent::new("whatever", json!({}))), "");
    }

    #[test]
    fn notice_render_substitutes_and_clamps() {
        let template = NoticeTemplate::new("Whaddya want?", "Permission requested: {detail}");
        let (title, body) = template.render("bash   rm -rf target", 30);
        assert_eq!(title, "Whaddya want?");
        assert_eq!(body, "Permission requested: bash rm…");
    }
}
