use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;

/// Delay before a trigger reply is delivered.
pub const TRIGGER_REPLY_DELAY: Duration = Duration::from_millis(1500);
/// Delay before a random pool reply is delivered.
pub const POOL_REPLY_DELAY: Duration = Duration::from_millis(2000);
/// Delay between a scan and its verdict.
pub const SCAN_VERDICT_DELAY: Duration = Duration::from_millis(5000);
/// First stage of the mock image analysis.
pub const IMAGE_STAGE_DELAY: Duration = Duration::from_millis(1500);
/// Second stage, after which the analysis line is delivered.
pub const IMAGE_RESULT_DELAY: Duration = Duration::from_millis(2500);
/// Recording stops on its own after this long.
pub const RECORDING_TIMEOUT: Duration = Duration::from_secs(10);

pub const IMAGE_STAGE_ONE_LABEL: &str = "Analysing uploaded image...";
pub const IMAGE_STAGE_TWO_LABEL: &str = "Cross-referencing room layout...";
pub const SCAN_LABEL: &str = "Verifying code...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GamePhase {
    Phase1,
    Phase2,
    Phase3,
    Broken,
}

impl GamePhase {
    pub fn name(self) -> &'static str {
        match self {
            GamePhase::Phase1 => "phase_1",
            GamePhase::Phase2 => "phase_2",
            GamePhase::Phase3 => "phase_3",
            GamePhase::Broken => "broken",
        }
    }

    /// Connection status shown in the header.
    pub fn status_label(self) -> &'static str {
        match self {
            GamePhase::Phase1 => "Online",
            GamePhase::Phase2 => "Connection Unstable",
            GamePhase::Phase3 => "Signal Degraded",
            GamePhase::Broken => "SYSTEM FAILURE",
        }
    }

    /// The next narrative phase, if any. Broken is only ever entered
    /// through a trigger, never by normal progression.
    pub fn next(self) -> Option<GamePhase> {
        match self {
            GamePhase::Phase1 => Some(GamePhase::Phase2),
            GamePhase::Phase2 => Some(GamePhase::Phase3),
            GamePhase::Phase3 | GamePhase::Broken => None,
        }
    }
}

/// Which input paths a scenario enables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modalities {
    pub qr: bool,
    pub voice: bool,
    pub image: bool,
}

/// Exact-match keyword entry. Keys are stored uppercased; lookup
/// uppercases the trimmed input.
#[derive(Debug, Clone, Copy)]
pub struct Trigger {
    pub key: &'static str,
    pub response: &'static str,
    pub next_phase: Option<GamePhase>,
}

/// How image "analysis" affects the phase.
#[derive(Debug, Clone, Copy)]
pub enum ImageAdvance {
    Never,
    /// The first analysis performed in `from` always moves to `to`.
    Scripted { from: GamePhase, to: GamePhase },
    /// Advance to the next phase on a coin flip. Presentational flavor,
    /// not a contract on the distribution.
    CoinFlip,
}

/// A reply the host will deliver after `delay`. The phase transition, if
/// any, is applied when the reply lands, never earlier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub content: String,
    pub next_phase: Option<GamePhase>,
    pub delay: Duration,
}

pub struct Scenario {
    pub name: &'static str,
    pub title: &'static str,
    pub welcome: &'static str,
    pub modalities: Modalities,
    text_triggers: &'static [Trigger],
    voice_triggers: &'static [Trigger],
    responses: &'static [(GamePhase, &'static [&'static str])],
    /// The single code a scan must decode to, with its hint and target phase.
    qr_secret: Option<(&'static str, &'static str, GamePhase)>,
    qr_rejection: &'static str,
    transcripts: &'static [&'static str],
    image_lines: &'static [&'static str],
    image_advance: ImageAdvance,
}

impl Scenario {
    pub fn all() -> &'static [Scenario] {
        SCENARIOS
    }

    pub fn by_name(name: &str) -> Option<&'static Scenario> {
        SCENARIOS.iter().find(|s| s.name == name)
    }

    /// Canned lines for a phase. Every scenario defines a non-empty pool
    /// for every phase.
    pub fn pool(&self, phase: GamePhase) -> &'static [&'static str] {
        self.responses
            .iter()
            .find(|(p, _)| *p == phase)
            .map(|(_, lines)| *lines)
            .unwrap_or(&[])
    }

    fn lookup<'a>(table: &'a [Trigger], input: &str) -> Option<&'a Trigger> {
        let key = input.trim().to_uppercase();
        table.iter().find(|t| t.key == key)
    }

    fn pool_reply(&self, phase: GamePhase) -> Reply {
        let pool = self.pool(phase);
        let line = pool
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("...");
        Reply {
            content: line.to_string(),
            next_phase: None,
            delay: POOL_REPLY_DELAY,
        }
    }

    fn table_reply(&self, table: &[Trigger], phase: GamePhase, input: &str) -> Option<Reply> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Some(trigger) = Self::lookup(table, trimmed) {
            return Some(Reply {
                content: trigger.response.to_string(),
                next_phase: trigger.next_phase,
                delay: TRIGGER_REPLY_DELAY,
            });
        }
        Some(self.pool_reply(phase))
    }

    /// Script a reply to typed input. Returns None for blank input.
    pub fn text_reply(&self, phase: GamePhase, input: &str) -> Option<Reply> {
        self.table_reply(self.text_triggers, phase, input)
    }

    /// Script a reply to a mock transcript. Checked against the voice
    /// trigger table, falling back to the phase pool.
    pub fn voice_reply(&self, phase: GamePhase, transcript: &str) -> Option<Reply> {
        self.table_reply(self.voice_triggers, phase, transcript)
    }

    /// Verdict on a decoded scan. Anything but the exact secret (after
    /// trimming) is rejected with no phase change.
    pub fn scan_verdict(&self, decoded: &str) -> Reply {
        if let Some((secret, hint, next)) = self.qr_secret {
            if decoded.trim() == secret {
                return Reply {
                    content: hint.to_string(),
                    next_phase: Some(next),
                    delay: SCAN_VERDICT_DELAY,
                };
            }
        }
        Reply {
            content: self.qr_rejection.to_string(),
            next_phase: None,
            delay: SCAN_VERDICT_DELAY,
        }
    }

    /// Stand-in for transcription: a uniformly-random line from the
    /// hardcoded transcript pool.
    pub fn pick_transcript(&self) -> &'static str {
        self.transcripts
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("")
    }

    /// Mock image analysis result. The delay only covers the second
    /// stage; the caller runs the first stage before this lands.
    pub fn image_reply(&self, phase: GamePhase) -> Reply {
        let line = self
            .image_lines
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("...");
        let next_phase = match self.image_advance {
            ImageAdvance::Never => None,
            ImageAdvance::Scripted { from, to } => (phase == from).then_some(to),
            ImageAdvance::CoinFlip => {
                if rand::thread_rng().gen_bool(0.5) {
                    phase.next()
                } else {
                    None
                }
            }
        };
        Reply {
            content: line.to_string(),
            next_phase,
            delay: IMAGE_RESULT_DELAY,
        }
    }
}

static SCENARIOS: &[Scenario] = &[
    // The birthday bedroom hunt. Text plus a QR scanner; the only
    // scenario with a scannable secret.
    Scenario {
        name: "bedroom",
        title: "ROOM_KEYPER",
        welcome: "I'll help you escape from this room. First, take a look around. \
                  I can also accept clues in the form of sounds or images.",
        modalities: Modalities {
            qr: true,
            voice: false,
            image: false,
        },
        text_triggers: &[
            Trigger {
                key: "ALERT",
                response: "Soft as a cradle, but keeper of fears. I guard the whispers \
                           that haunt your ears. I hide what you seek, though silent I stay. \
                           Lift me, and find it - before dreams decay.",
                next_phase: Some(GamePhase::Phase2),
            },
            Trigger {
                key: "SHIZUOKA",
                response: "Kuroko no Basket... Cardcaptor Sakura... Nausicaa.... n!er.... \
                           suzume.... Th3re is a b00k that d0es n0t l00k fam!l!er....",
                next_phase: Some(GamePhase::Broken),
            },
        ],
        voice_triggers: &[],
        responses: &[
            (
                GamePhase::Phase1,
                &[
                    "Take a look around the room. There must be some clues.",
                    "I see white... rectangle... doors...",
                    "The photos and pictures on the wall look suspicious too.",
                ],
            ),
            (
                GamePhase::Phase2,
                &[
                    "You were just there a moment ago.",
                    "Behind you... no, must be my imagination. But be careful.",
                    "I cradle your head... and whisper when you sleep. What am I?",
                ],
            ),
            (
                GamePhase::Phase3,
                &[
                    "drip.... drip.... drip....",
                    "Where the tiles are cold, your secret waits.",
                    "Have you taken a shower yet? Something stinks...",
                ],
            ),
            (
                GamePhase::Broken,
                &[
                    "upst@!rs....f!nd....th3m.....",
                    "th3y...w4tch...y0u...fr0m....th3....ab0ve....",
                    "d0...n0t...tr5st...",
                ],
            ),
        ],
        qr_secret: Some((
            "KarlBD2025",
            "Seek the chamber where droplets sing, a hidden cloud on silver string. \
             Step inside, let waters pour, they'll cleanse your skin, and so much more. \
             Delay too long, the stench will stay - wash now, or filth will mark your way.",
            GamePhase::Phase3,
        )),
        qr_rejection: "Wrong QR code has been scanned. Try again.",
        transcripts: &[],
        image_lines: &[],
        image_advance: ImageAdvance::Never,
    },
    // The parlor seance. Text, voice and image; the only scenario with a
    // voice-trigger table.
    Scenario {
        name: "seance",
        title: "THE_OTHER_SIDE",
        welcome: "The circle is open. Speak, whisper, or show me what you find. \
                  I will listen from the other side.",
        modalities: Modalities {
            qr: false,
            voice: true,
            image: true,
        },
        text_triggers: &[
            Trigger {
                key: "CANDLE",
                response: "Wax remembers every flame it fed. Count the stubs on the \
                           mantel and you will know how many came before you.",
                next_phase: Some(GamePhase::Phase2),
            },
            Trigger {
                key: "THIRTEEN",
                response: "n0...n0t th4t numb3r...wh0 t0ld y0u...wh0 T0LD y0u...",
                next_phase: Some(GamePhase::Broken),
            },
        ],
        voice_triggers: &[
            Trigger {
                key: "THE CANDLE WENT OUT",
                response: "Then something is breathing in the room with you. \
                           Follow the draft to where the wall is coldest.",
                next_phase: Some(GamePhase::Phase2),
            },
            Trigger {
                key: "THE MIRROR REMEMBERS",
                response: "Yes. It keeps every face it has ever held. Turn it to the \
                           window at the hour the clock refuses to strike.",
                next_phase: Some(GamePhase::Phase3),
            },
        ],
        responses: &[
            (
                GamePhase::Phase1,
                &[
                    "The table is not level. Something under it wants to be found.",
                    "Ask the room a question. It has been waiting to answer.",
                    "I smell smoke, though nothing here burns.",
                ],
            ),
            (
                GamePhase::Phase2,
                &[
                    "The draft comes from a wall with no door. Curious.",
                    "Knock twice. If it knocks back, do not knock again.",
                    "The portraits have been rearranged since you arrived.",
                ],
            ),
            (
                GamePhase::Phase3,
                &[
                    "The mirror is warmer than the room. Press your palm to it.",
                    "Midnight never comes on that clock. Stop it at eleven.",
                    "You are very close now. So is something else.",
                ],
            ),
            (
                GamePhase::Broken,
                &[
                    "the c!rcle...!s...br0ken...",
                    "!t...c4me...thr0ugh...",
                    "d0...n0t...l00k...beh!nd...the...ve!l...",
                ],
            ),
        ],
        qr_secret: None,
        qr_rejection: "Nothing to scan here.",
        transcripts: &[
            "is anyone there",
            "show yourself",
            "the candle went out",
            "the mirror remembers",
            "i hear footsteps upstairs",
        ],
        image_lines: &[
            "That photograph was taken in this room. Count the chairs - one is missing.",
            "There is a figure in the window glass. It is not your reflection.",
            "The wallpaper pattern repeats everywhere except behind the cabinet.",
        ],
        image_advance: ImageAdvance::Scripted {
            from: GamePhase::Phase1,
            to: GamePhase::Phase2,
        },
    },
    // The records archive. Text plus image upload; image analysis may
    // advance the phase on a coin flip.
    Scenario {
        name: "archive",
        title: "CARD_CATALOG",
        welcome: "Welcome to the stacks. Every file in this archive is exactly where \
                  it should be, which is the problem. Show me what you find.",
        modalities: Modalities {
            qr: false,
            voice: false,
            image: true,
        },
        text_triggers: &[
            Trigger {
                key: "LEDGER",
                response: "The 1974 ledger has two pages with the same number. The \
                           second one is the lie. Bring me what is written between them.",
                next_phase: Some(GamePhase::Phase2),
            },
            Trigger {
                key: "MICROFILM",
                response: "Reel 9 was never catalogued, yet there it sits. Thread it \
                           and look for the frame that was photographed twice.",
                next_phase: Some(GamePhase::Phase3),
            },
            Trigger {
                key: "REDACTED",
                response: "y0u...re4d...the...bl4ck...l!nes...they...re4d...y0u...b4ck...",
                next_phase: Some(GamePhase::Broken),
            },
        ],
        voice_triggers: &[],
        responses: &[
            (
                GamePhase::Phase1,
                &[
                    "Start with the card catalog. One drawer is labeled in a different hand.",
                    "Dust lies evenly everywhere except the third shelf.",
                    "The index says 412 boxes. I count 413.",
                ],
            ),
            (
                GamePhase::Phase2,
                &[
                    "The ledger's binding is newer than its pages.",
                    "Someone has been filing things here at night.",
                    "Check the dates. February 30th appears twice.",
                ],
            ),
            (
                GamePhase::Phase3,
                &[
                    "The microfilm reader hums even when unplugged.",
                    "The duplicate frame shows this room. You are in it.",
                    "Whatever you take from here, leave the reel.",
                ],
            ),
            (
                GamePhase::Broken,
                &[
                    "f!le...n0t...f0und...f!le...f0und...y0u...",
                    "the...4rch!ve...rememb3rs...ev3ry0ne...",
                    "sh3lv!ng...err0r...sh3lv!ng...ERR0R...",
                ],
            ),
        ],
        qr_secret: None,
        qr_rejection: "Nothing to scan here.",
        transcripts: &[],
        image_lines: &[
            "A filing stamp from an office that closed in 1951. Recent ink, though.",
            "The shelf in your photo is bolted to a wall that is not on the floor plan.",
            "Enlarging the corner: that label has been steamed off and reglued.",
            "Nothing unusual. Which is unusual, for this room.",
        ],
        image_advance: ImageAdvance::CoinFlip,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    fn bedroom() -> &'static Scenario {
        Scenario::by_name("bedroom").unwrap()
    }

    #[test]
    fn registry_has_three_scenarios() {
        let names: Vec<&str> = Scenario::all().iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["bedroom", "seance", "archive"]);
        assert!(Scenario::by_name("attic").is_none());
    }

    #[test]
    fn modalities_match_variants() {
        let bedroom = Scenario::by_name("bedroom").unwrap();
        assert!(bedroom.modalities.qr && !bedroom.modalities.voice && !bedroom.modalities.image);

        let seance = Scenario::by_name("seance").unwrap();
        assert!(!seance.modalities.qr && seance.modalities.voice && seance.modalities.image);

        let archive = Scenario::by_name("archive").unwrap();
        assert!(!archive.modalities.qr && !archive.modalities.voice && archive.modalities.image);
    }

    #[test]
    fn every_phase_has_a_nonempty_pool() {
        let phases = [
            GamePhase::Phase1,
            GamePhase::Phase2,
            GamePhase::Phase3,
            GamePhase::Broken,
        ];
        for scenario in Scenario::all() {
            for phase in phases {
                assert!(
                    !scenario.pool(phase).is_empty(),
                    "{} has an empty pool for {}",
                    scenario.name,
                    phase.name()
                );
            }
        }
    }

    #[test]
    fn trigger_match_is_trimmed_and_case_insensitive() {
        let reply = bedroom().text_reply(GamePhase::Phase1, "  alert ").unwrap();
        assert!(reply.content.starts_with("Soft as a cradle"));
        assert_eq!(reply.next_phase, Some(GamePhase::Phase2));
        assert_eq!(reply.delay, TRIGGER_REPLY_DELAY);
    }

    #[test]
    fn shizuoka_breaks_the_host() {
        let reply = bedroom().text_reply(GamePhase::Phase2, "shizuoka").unwrap();
        assert_eq!(reply.next_phase, Some(GamePhase::Broken));
    }

    #[test]
    fn blank_input_yields_no_reply() {
        assert!(bedroom().text_reply(GamePhase::Phase1, "   ").is_none());
        assert!(bedroom().text_reply(GamePhase::Phase1, "").is_none());
    }

    #[test]
    fn unmatched_input_draws_from_current_phase_pool() {
        let phases = [
            GamePhase::Phase1,
            GamePhase::Phase2,
            GamePhase::Phase3,
            GamePhase::Broken,
        ];
        for phase in phases {
            for _ in 0..20 {
                let reply = bedroom().text_reply(phase, "what do I do").unwrap();
                assert!(
                    bedroom().pool(phase).contains(&reply.content.as_str()),
                    "reply {:?} not in {} pool",
                    reply.content,
                    phase.name()
                );
                assert_eq!(reply.next_phase, None);
                assert_eq!(reply.delay, POOL_REPLY_DELAY);
            }
        }
    }

    #[test]
    fn scan_accepts_only_the_exact_secret() {
        let hit = bedroom().scan_verdict(" KarlBD2025 ");
        assert!(hit.content.starts_with("Seek the chamber"));
        assert_eq!(hit.next_phase, Some(GamePhase::Phase3));

        let miss = bedroom().scan_verdict("KarlBD2024");
        assert_eq!(miss.content, "Wrong QR code has been scanned. Try again.");
        assert_eq!(miss.next_phase, None);

        // Scenarios without a secret reject everything.
        let seance = Scenario::by_name("seance").unwrap();
        assert_eq!(seance.scan_verdict("KarlBD2025").next_phase, None);
    }

    #[test]
    fn transcripts_come_from_the_pool() {
        let seance = Scenario::by_name("seance").unwrap();
        for _ in 0..50 {
            let transcript = seance.pick_transcript();
            assert!(seance.transcripts.contains(&transcript));
        }
    }

    #[test]
    fn voice_trigger_applies_its_transition() {
        let seance = Scenario::by_name("seance").unwrap();
        let reply = seance
            .voice_reply(GamePhase::Phase2, "the mirror remembers")
            .unwrap();
        assert_eq!(reply.next_phase, Some(GamePhase::Phase3));

        // A non-trigger transcript falls back to the current phase pool.
        let reply = seance
            .voice_reply(GamePhase::Phase1, "is anyone there")
            .unwrap();
        assert!(seance.pool(GamePhase::Phase1).contains(&reply.content.as_str()));
        assert_eq!(reply.next_phase, None);
    }

    #[test]
    fn scripted_image_advance_fires_only_from_its_phase() {
        let seance = Scenario::by_name("seance").unwrap();
        for _ in 0..10 {
            let reply = seance.image_reply(GamePhase::Phase1);
            assert_eq!(reply.next_phase, Some(GamePhase::Phase2));
            let reply = seance.image_reply(GamePhase::Phase2);
            assert_eq!(reply.next_phase, None);
        }
    }

    #[test]
    fn coin_flip_image_advance_never_enters_broken() {
        let archive = Scenario::by_name("archive").unwrap();
        for _ in 0..50 {
            let reply = archive.image_reply(GamePhase::Phase3);
            // Phase3 has no successor, so the flip can never move anywhere.
            assert_eq!(reply.next_phase, None);

            let reply = archive.image_reply(GamePhase::Phase1);
            assert!(matches!(reply.next_phase, None | Some(GamePhase::Phase2)));
        }
    }
}
