use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use tokio::sync::mpsc::UnboundedSender;

use crate::app::{App, Indicator, LineEdit, Overlay};
use crate::config::Config;
use crate::script::{
    GamePhase, Reply, IMAGE_STAGE_DELAY, IMAGE_STAGE_TWO_LABEL, RECORDING_TIMEOUT,
};
use crate::tui::{AppEvent, ScriptEvent};

pub fn handle_event(app: &mut App, event: AppEvent, tx: &UnboundedSender<AppEvent>) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key, tx)?,
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => app.scroll_chat_to_bottom(),
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Script(script) => handle_script(app, script, tx),
    }
    Ok(())
}

fn handle_script(app: &mut App, script: ScriptEvent, tx: &UnboundedSender<AppEvent>) {
    match script {
        ScriptEvent::Reply(reply) => app.apply_reply(reply),
        ScriptEvent::AnalyzingLabel(label) => {
            if matches!(app.indicator, Indicator::Analyzing(_)) {
                app.indicator = Indicator::Analyzing(label);
            }
        }
        ScriptEvent::RecordingTimeout => {
            log::info!("recording hit its timeout");
            if let Some(reply) = app.finish_recording() {
                schedule_reply(tx, reply);
            }
        }
    }
}

fn handle_key(app: &mut App, key: KeyEvent, tx: &UnboundedSender<AppEvent>) -> Result<()> {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }

    // Overlays grab the keyboard while open
    match &mut app.overlay {
        Overlay::Scanner(_) => {
            handle_scanner_key(app, key, tx);
            return Ok(());
        }
        Overlay::Upload(_) => {
            handle_upload_key(app, key, tx);
            return Ok(());
        }
        Overlay::None => {}
    }

    if app.editing {
        handle_editing_key(app, key, tx)?;
    } else {
        handle_normal_key(app, key, tx)?;
    }
    Ok(())
}

fn handle_normal_key(app: &mut App, key: KeyEvent, tx: &UnboundedSender<AppEvent>) -> Result<()> {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Back to the input line
        KeyCode::Char('i') | KeyCode::Char('/') | KeyCode::Enter | KeyCode::Tab => {
            app.editing = true;
        }

        // Chat scrolling
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(),
        KeyCode::Char('g') => app.chat_scroll = 0,
        KeyCode::Char('G') => app.scroll_chat_to_bottom(),

        // Device stubs, gated by the scenario's modalities
        KeyCode::Char('c') => {
            if app.scenario.modalities.qr && device_available(app) {
                app.open_scanner();
            }
        }
        KeyCode::Char('v') => {
            if app.scenario.modalities.voice {
                toggle_recording(app, tx);
            }
        }
        KeyCode::Char('u') => {
            if app.scenario.modalities.image && device_available(app) {
                app.open_upload();
            }
        }

        KeyCode::Char('t') => {
            app.show_timestamps = !app.show_timestamps;
            if let Err(err) = Config::save_show_timestamps(app.show_timestamps) {
                log::warn!("could not persist timestamp setting: {err}");
            }
        }

        _ => {}
    }
    Ok(())
}

fn handle_editing_key(app: &mut App, key: KeyEvent, tx: &UnboundedSender<AppEvent>) -> Result<()> {
    match key.code {
        KeyCode::Esc | KeyCode::Tab => app.editing = false,
        KeyCode::Enter => {
            if let Some(reply) = app.submit_input() {
                schedule_reply(tx, reply);
            }
        }
        KeyCode::Backspace => app.input.backspace(),
        KeyCode::Delete => app.input.delete(),
        KeyCode::Left => app.input.left(),
        KeyCode::Right => app.input.right(),
        KeyCode::Home => app.input.home(),
        KeyCode::End => app.input.end(),
        KeyCode::Char(c) => app.input.insert(c),
        _ => {}
    }
    Ok(())
}

fn handle_scanner_key(app: &mut App, key: KeyEvent, tx: &UnboundedSender<AppEvent>) {
    match key.code {
        KeyCode::Esc => app.cancel_scan(),
        KeyCode::Enter => {
            if let Some(reply) = app.submit_scan() {
                schedule_reply(tx, reply);
            }
        }
        _ => edit_overlay_line(app, key),
    }
}

fn handle_upload_key(app: &mut App, key: KeyEvent, tx: &UnboundedSender<AppEvent>) {
    match key.code {
        KeyCode::Esc => app.cancel_upload(),
        KeyCode::Enter => {
            if let Some(reply) = app.submit_upload() {
                schedule_image_analysis(tx, reply);
            }
        }
        _ => edit_overlay_line(app, key),
    }
}

fn edit_overlay_line(app: &mut App, key: KeyEvent) {
    let edit: &mut LineEdit = match &mut app.overlay {
        Overlay::Scanner(edit) | Overlay::Upload(edit) => edit,
        Overlay::None => return,
    };
    match key.code {
        KeyCode::Backspace => edit.backspace(),
        KeyCode::Delete => edit.delete(),
        KeyCode::Left => edit.left(),
        KeyCode::Right => edit.right(),
        KeyCode::Home => edit.home(),
        KeyCode::End => edit.end(),
        KeyCode::Char(c) => edit.insert(c),
        _ => {}
    }
}

fn device_available(app: &App) -> bool {
    // The original disables its camera button once the host is broken.
    !app.busy() && app.phase != GamePhase::Broken
}

fn toggle_recording(app: &mut App, tx: &UnboundedSender<AppEvent>) {
    if app.indicator == Indicator::Recording {
        if let Some(reply) = app.finish_recording() {
            schedule_reply(tx, reply);
        }
    } else if device_available(app) {
        app.start_recording();
        let tx = tx.clone();
        app.record_timeout = Some(tokio::spawn(async move {
            tokio::time::sleep(RECORDING_TIMEOUT).await;
            let _ = tx.send(AppEvent::Script(ScriptEvent::RecordingTimeout));
        }));
    }
}

/// Deliver a canned reply after its scripted delay.
fn schedule_reply(tx: &UnboundedSender<AppEvent>, reply: Reply) {
    let tx = tx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(reply.delay).await;
        let _ = tx.send(AppEvent::Script(ScriptEvent::Reply(reply)));
    });
}

/// Two chained delays: the stage label switches partway through, then
/// the analysis line lands.
fn schedule_image_analysis(tx: &UnboundedSender<AppEvent>, reply: Reply) {
    let tx = tx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(IMAGE_STAGE_DELAY).await;
        let _ = tx.send(AppEvent::Script(ScriptEvent::AnalyzingLabel(
            IMAGE_STAGE_TWO_LABEL,
        )));
        tokio::time::sleep(reply.delay).await;
        let _ = tx.send(AppEvent::Script(ScriptEvent::Reply(reply)));
    });
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollDown => {
            app.scroll_down();
            app.scroll_down();
            app.scroll_down();
        }
        MouseEventKind::ScrollUp => {
            app.scroll_up();
            app.scroll_up();
            app.scroll_up();
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn scheduled_reply_arrives_after_its_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        schedule_reply(
            &tx,
            Reply {
                content: "canned".to_string(),
                next_phase: None,
                delay: Duration::from_millis(1500),
            },
        );
        match rx.recv().await {
            Some(AppEvent::Script(ScriptEvent::Reply(reply))) => {
                assert_eq!(reply.content, "canned");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn image_analysis_emits_stage_label_before_the_reply() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        schedule_image_analysis(
            &tx,
            Reply {
                content: "a filing stamp".to_string(),
                next_phase: None,
                delay: Duration::from_millis(2500),
            },
        );
        assert!(matches!(
            rx.recv().await,
            Some(AppEvent::Script(ScriptEvent::AnalyzingLabel(_)))
        ));
        assert!(matches!(
            rx.recv().await,
            Some(AppEvent::Script(ScriptEvent::Reply(_)))
        ));
    }
}
