use time::OffsetDateTime;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::script::{GamePhase, Reply, Scenario, IMAGE_STAGE_ONE_LABEL, SCAN_LABEL};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    Player,
    Host,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    Text,
    Voice,
    Image,
}

/// One chat entry. Immutable once appended; the log is append-only.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: u64,
    pub sender: Sender,
    pub content: String,
    pub modality: Modality,
    /// Phase at the time the message was created, for styling.
    pub phase: GamePhase,
    pub timestamp: OffsetDateTime,
}

/// The single transient activity the host can show at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    Idle,
    Typing,
    Analyzing(&'static str),
    Recording,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// A single-line editor with a char-indexed cursor, shared by the chat
/// input and the overlay prompts.
#[derive(Debug, Default, Clone)]
pub struct LineEdit {
    pub text: String,
    pub cursor: usize,
}

impl LineEdit {
    pub fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.text, self.cursor);
        self.text.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.text.chars().count() {
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.text.chars().count());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.text.chars().count();
    }

    /// Drain the buffer, resetting the cursor.
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.text)
    }
}

/// Modal prompt rendered over the chat.
#[derive(Debug, Clone)]
pub enum Overlay {
    None,
    /// Scanner waiting for a decoded code.
    Scanner(LineEdit),
    /// File picker waiting for a path.
    Upload(LineEdit),
}

pub struct App {
    pub should_quit: bool,
    pub scenario: &'static Scenario,
    pub phase: GamePhase,

    pub messages: Vec<Message>,
    next_message_id: u64,

    pub input: LineEdit,
    pub editing: bool,
    pub indicator: Indicator,
    pub overlay: Overlay,

    // Chat viewport, updated during render
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,

    // Animation state (0-3, advanced by Tick)
    pub animation_frame: u8,

    pub show_timestamps: bool,

    /// Auto-stop timer for an active recording, aborted on manual stop.
    pub record_timeout: Option<JoinHandle<()>>,
}

impl App {
    pub fn new(scenario: &'static Scenario, config: &Config) -> Self {
        let mut app = Self {
            should_quit: false,
            scenario,
            phase: GamePhase::Phase1,
            messages: Vec::new(),
            next_message_id: 0,
            input: LineEdit::default(),
            editing: true,
            indicator: Indicator::Idle,
            overlay: Overlay::None,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            animation_frame: 0,
            show_timestamps: config.show_timestamps.unwrap_or(true),
            record_timeout: None,
        };
        // The welcome line is appended exactly once, here, so no render
        // guard is needed.
        app.push_message(Sender::Host, scenario.welcome.to_string(), Modality::Text);
        app
    }

    pub fn push_message(&mut self, sender: Sender, content: String, modality: Modality) {
        let id = self.next_message_id;
        self.next_message_id += 1;
        log::debug!("message {id}: {sender:?}/{modality:?} in {}", self.phase.name());
        self.messages.push(Message {
            id,
            sender,
            content,
            modality,
            phase: self.phase,
            timestamp: OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc()),
        });
        self.scroll_chat_to_bottom();
    }

    pub fn busy(&self) -> bool {
        self.indicator != Indicator::Idle
    }

    /// Submit the input line. Blank input is rejected without appending
    /// anything or toggling the indicator. Returns the reply to schedule.
    pub fn submit_input(&mut self) -> Option<Reply> {
        if self.busy() {
            return None;
        }
        let text = self.input.text.trim().to_string();
        if text.is_empty() {
            return None;
        }
        self.input.take();
        let reply = self.scenario.text_reply(self.phase, &text)?;
        self.push_message(Sender::Player, text, Modality::Text);
        self.indicator = Indicator::Typing;
        Some(reply)
    }

    /// Deliver a scheduled reply: append the host line, then apply the
    /// transition. The message keeps the phase it was written in.
    pub fn apply_reply(&mut self, reply: Reply) {
        self.push_message(Sender::Host, reply.content, Modality::Text);
        if let Some(next) = reply.next_phase {
            log::info!("phase transition: {} -> {}", self.phase.name(), next.name());
            self.phase = next;
        }
        self.indicator = Indicator::Idle;
    }

    // Scanner path

    pub fn open_scanner(&mut self) {
        self.push_message(
            Sender::Player,
            "Opening the camera...".to_string(),
            Modality::Text,
        );
        self.overlay = Overlay::Scanner(LineEdit::default());
    }

    /// Close the scanner and run the verdict against the decoded text.
    pub fn submit_scan(&mut self) -> Option<Reply> {
        let decoded = match &mut self.overlay {
            Overlay::Scanner(edit) => edit.take(),
            _ => return None,
        };
        self.overlay = Overlay::None;
        self.indicator = Indicator::Analyzing(SCAN_LABEL);
        log::info!("scan decoded {} chars", decoded.chars().count());
        Some(self.scenario.scan_verdict(&decoded))
    }

    pub fn cancel_scan(&mut self) {
        self.overlay = Overlay::None;
        self.push_message(
            Sender::Host,
            "Camera stream closed.".to_string(),
            Modality::Text,
        );
    }

    // Image upload path

    pub fn open_upload(&mut self) {
        self.overlay = Overlay::Upload(LineEdit::default());
    }

    /// Accept any path; the file content is never inspected.
    pub fn submit_upload(&mut self) -> Option<Reply> {
        let path = match &mut self.overlay {
            Overlay::Upload(edit) => edit.take(),
            _ => return None,
        };
        let path = path.trim().to_string();
        if path.is_empty() {
            return None;
        }
        self.overlay = Overlay::None;
        let file_name = path.rsplit('/').next().unwrap_or(&path).to_string();
        self.push_message(Sender::Player, file_name, Modality::Image);
        self.indicator = Indicator::Analyzing(IMAGE_STAGE_ONE_LABEL);
        Some(self.scenario.image_reply(self.phase))
    }

    pub fn cancel_upload(&mut self) {
        self.overlay = Overlay::None;
    }

    // Voice path

    pub fn start_recording(&mut self) {
        self.indicator = Indicator::Recording;
    }

    /// Stop recording (manually or by timeout), replace the "audio" with
    /// a mock transcript, and script the reply to it.
    pub fn finish_recording(&mut self) -> Option<Reply> {
        if self.indicator != Indicator::Recording {
            return None;
        }
        if let Some(handle) = self.record_timeout.take() {
            handle.abort();
        }
        let transcript = self.scenario.pick_transcript().to_string();
        log::info!("mock transcript: {transcript:?}");
        let reply = self.scenario.voice_reply(self.phase, &transcript);
        self.push_message(Sender::Player, transcript, Modality::Voice);
        match reply {
            Some(reply) => {
                self.indicator = Indicator::Typing;
                Some(reply)
            }
            None => {
                self.indicator = Indicator::Idle;
                None
            }
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.busy() {
            self.animation_frame = (self.animation_frame + 1) % 4;
        }
    }

    // Chat scrolling

    fn chat_total_lines(&self) -> u16 {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;
        for msg in &self.messages {
            total_lines += 1; // sender line
            for line in msg.content.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                if char_count == 0 {
                    total_lines += 1;
                } else {
                    total_lines += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total_lines += 1; // blank line after message
        }
        if self.busy() {
            total_lines += 2; // indicator label + animated line
        }
        total_lines
    }

    pub fn scroll_chat_to_bottom(&mut self) {
        let total = self.chat_total_lines();
        let visible = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };
        self.chat_scroll = total.saturating_sub(visible);
    }

    pub fn scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        let max = self.chat_total_lines().saturating_sub(self.chat_height);
        if self.chat_scroll < max {
            self.chat_scroll += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::TRIGGER_REPLY_DELAY;

    fn new_app(name: &str) -> App {
        App::new(Scenario::by_name(name).unwrap(), &Config::new())
    }

    #[test]
    fn welcome_message_is_appended_exactly_once() {
        let app = new_app("bedroom");
        assert_eq!(app.messages.len(), 1);
        assert_eq!(app.messages[0].sender, Sender::Host);
        assert!(app.messages[0].content.starts_with("I'll help you escape"));
    }

    #[test]
    fn blank_input_appends_nothing_and_stays_idle() {
        let mut app = new_app("bedroom");
        app.input.text = "   ".to_string();
        assert!(app.submit_input().is_none());
        assert_eq!(app.messages.len(), 1);
        assert_eq!(app.indicator, Indicator::Idle);
    }

    #[test]
    fn submit_appends_player_message_and_schedules_one_reply() {
        let mut app = new_app("bedroom");
        app.input.text = "alert".to_string();
        let reply = app.submit_input().expect("trigger reply");
        assert_eq!(reply.next_phase, Some(GamePhase::Phase2));
        assert_eq!(reply.delay, TRIGGER_REPLY_DELAY);
        assert_eq!(app.messages.len(), 2);
        assert_eq!(app.messages[1].sender, Sender::Player);
        assert_eq!(app.messages[1].content, "alert");
        assert_eq!(app.indicator, Indicator::Typing);
        assert!(app.input.text.is_empty());

        // While the host is typing, further submissions are ignored.
        app.input.text = "alert".to_string();
        assert!(app.submit_input().is_none());
        assert_eq!(app.messages.len(), 2);
    }

    #[test]
    fn apply_reply_transitions_after_recording_the_old_phase() {
        let mut app = new_app("bedroom");
        app.input.text = "ALERT".to_string();
        let reply = app.submit_input().unwrap();
        app.apply_reply(reply);

        let host_reply = app.messages.last().unwrap();
        assert_eq!(host_reply.sender, Sender::Host);
        // The reply is stamped with the phase it was written in.
        assert_eq!(host_reply.phase, GamePhase::Phase1);
        assert_eq!(app.phase, GamePhase::Phase2);
        assert_eq!(app.indicator, Indicator::Idle);
    }

    #[test]
    fn message_log_is_append_only_with_increasing_ids() {
        let mut app = new_app("bedroom");
        for text in ["hello", "anyone there", "ALERT"] {
            app.input.text = text.to_string();
            if let Some(reply) = app.submit_input() {
                app.apply_reply(reply);
            }
        }
        let snapshot: Vec<(u64, String)> = app
            .messages
            .iter()
            .map(|m| (m.id, m.content.clone()))
            .collect();
        for pair in snapshot.windows(2) {
            assert!(pair[0].0 < pair[1].0, "ids must strictly increase");
        }

        app.input.text = "one more".to_string();
        let reply = app.submit_input().unwrap();
        app.apply_reply(reply);
        for (i, (id, content)) in snapshot.iter().enumerate() {
            assert_eq!(app.messages[i].id, *id);
            assert_eq!(&app.messages[i].content, content);
        }
    }

    #[test]
    fn scan_verdict_only_matches_the_secret() {
        let mut app = new_app("bedroom");
        app.open_scanner();
        assert!(matches!(app.overlay, Overlay::Scanner(_)));
        // The "Opening the camera..." line lands as a player message.
        assert_eq!(app.messages.last().unwrap().sender, Sender::Player);

        if let Overlay::Scanner(edit) = &mut app.overlay {
            edit.text = "KarlBD2025".to_string();
        }
        let reply = app.submit_scan().unwrap();
        assert_eq!(reply.next_phase, Some(GamePhase::Phase3));
        assert!(matches!(app.indicator, Indicator::Analyzing(_)));

        app.apply_reply(reply);
        assert_eq!(app.phase, GamePhase::Phase3);

        // A wrong code leaves the phase alone.
        app.open_scanner();
        if let Overlay::Scanner(edit) = &mut app.overlay {
            edit.text = "nope".to_string();
        }
        let reply = app.submit_scan().unwrap();
        assert_eq!(reply.next_phase, None);
        app.apply_reply(reply);
        assert_eq!(app.phase, GamePhase::Phase3);
    }

    #[test]
    fn finished_recording_appends_a_voice_message() {
        let mut app = new_app("seance");
        app.start_recording();
        assert_eq!(app.indicator, Indicator::Recording);
        let reply = app.finish_recording();
        let voice = app.messages.last().unwrap();
        assert_eq!(voice.sender, Sender::Player);
        assert_eq!(voice.modality, Modality::Voice);
        assert!(reply.is_some());

        // Stopping again without an active recording is a no-op.
        assert!(app.finish_recording().is_none());
    }

    #[test]
    fn upload_accepts_any_path_without_inspecting_it() {
        let mut app = new_app("archive");
        app.open_upload();
        if let Overlay::Upload(edit) = &mut app.overlay {
            edit.text = "/tmp/does-not-exist/shelf.jpg".to_string();
        }
        let reply = app.submit_upload().expect("analysis reply");
        let image = app.messages.last().unwrap();
        assert_eq!(image.modality, Modality::Image);
        assert_eq!(image.content, "shelf.jpg");
        assert!(matches!(app.indicator, Indicator::Analyzing(_)));
        assert!(matches!(reply.next_phase, None | Some(GamePhase::Phase2)));
    }

    #[test]
    fn line_edit_is_utf8_safe() {
        let mut edit = LineEdit::default();
        for c in "héllo".chars() {
            edit.insert(c);
        }
        edit.left();
        edit.left();
        edit.insert('x');
        assert_eq!(edit.text, "hélxlo");
        edit.backspace();
        assert_eq!(edit.text, "héllo");
        assert_eq!(edit.take(), "héllo");
        assert_eq!(edit.cursor, 0);
    }
}
