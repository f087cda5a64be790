use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use time::format_description::FormatItem;
use time::macros::format_description;

use crate::app::{App, Indicator, Message, Modality, Overlay, Sender};
use crate::script::GamePhase;

const CLOCK_FORMAT: &[FormatItem<'static>] = format_description!("[hour]:[minute]:[second]");
const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, chat, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    match &app.overlay {
        Overlay::Scanner(_) => render_scanner_overlay(app, frame, area),
        Overlay::Upload(_) => render_upload_overlay(app, frame, area),
        Overlay::None => {}
    }
}

fn status_style(phase: GamePhase) -> Style {
    match phase {
        GamePhase::Phase1 => Style::default().fg(Color::Green),
        GamePhase::Phase2 => Style::default().fg(Color::Yellow),
        GamePhase::Phase3 => Style::default().fg(Color::Magenta),
        GamePhase::Broken => Style::default()
            .fg(Color::Red)
            .add_modifier(Modifier::BOLD | Modifier::RAPID_BLINK),
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = if app.phase == GamePhase::Broken {
        Span::styled(
            " SY5T3M_3RR0R ",
            Style::default()
                .fg(Color::Red)
                .add_modifier(Modifier::BOLD | Modifier::RAPID_BLINK),
        )
    } else {
        Span::styled(
            format!(" {} ", app.scenario.title),
            Style::default().fg(Color::Cyan).bold(),
        )
    };

    let line = Line::from(vec![
        title,
        Span::styled(app.phase.status_label(), status_style(app.phase)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(line).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

/// Style of a host line, driven by the phase the message was written in.
fn host_style(msg_phase: GamePhase, current: GamePhase) -> Style {
    match msg_phase {
        GamePhase::Phase1 => Style::default().fg(Color::Yellow),
        GamePhase::Broken => {
            let style = Style::default().fg(Color::Red).add_modifier(Modifier::BOLD);
            if current == GamePhase::Broken {
                style.add_modifier(Modifier::RAPID_BLINK)
            } else {
                style
            }
        }
        _ => Style::default().fg(Color::White),
    }
}

fn message_lines<'a>(app: &'a App, msg: &'a Message) -> Vec<Line<'a>> {
    let mut lines = Vec::new();

    let (who, who_style) = match msg.sender {
        Sender::Player => (
            "You:",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Sender::Host => (
            "Host:",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
    };

    let mut header = vec![Span::styled(who, who_style)];
    if app.show_timestamps {
        let clock = msg.timestamp.format(CLOCK_FORMAT).unwrap_or_default();
        header.push(Span::styled(
            format!(" {clock}"),
            Style::default().fg(Color::DarkGray),
        ));
    }
    lines.push(Line::from(header));

    let content_style = match msg.sender {
        Sender::Player => Style::default(),
        Sender::Host => host_style(msg.phase, app.phase),
    };
    let tag = match msg.modality {
        Modality::Text => None,
        Modality::Voice => Some("[voice] "),
        Modality::Image => Some("[image] "),
    };

    for (i, line) in msg.content.lines().enumerate() {
        let mut spans = Vec::new();
        if i == 0 {
            if let Some(tag) = tag {
                spans.push(Span::styled(tag, Style::default().fg(Color::DarkGray)));
            }
        }
        spans.push(Span::styled(line, content_style));
        lines.push(Line::from(spans));
    }
    lines.push(Line::default());
    lines
}

fn indicator_lines(app: &App) -> Vec<Line<'static>> {
    match app.indicator {
        Indicator::Idle => Vec::new(),
        Indicator::Typing => {
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize % 3) + 1);
            vec![
                Line::from(Span::styled(
                    "Host:",
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(
                    dots,
                    Style::default()
                        .fg(Color::DarkGray)
                        .add_modifier(Modifier::ITALIC),
                )),
            ]
        }
        Indicator::Analyzing(label) => {
            let spinner = SPINNER[app.animation_frame as usize % SPINNER.len()];
            vec![
                Line::default(),
                Line::from(Span::styled(
                    format!("{spinner} {label}"),
                    Style::default().fg(Color::Blue),
                )),
            ]
        }
        Indicator::Recording => {
            let pulse = if app.animation_frame % 2 == 0 {
                Color::Red
            } else {
                Color::DarkGray
            };
            vec![
                Line::default(),
                Line::from(vec![
                    Span::styled("* REC", Style::default().fg(pulse).bold()),
                    Span::styled(
                        "  recording... press v to stop",
                        Style::default().fg(Color::DarkGray),
                    ),
                ]),
            ]
        }
    }
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if app.phase == GamePhase::Broken {
            Color::Red
        } else {
            Color::DarkGray
        }))
        .title(format!(" {} ", app.scenario.name))
        .title_bottom(
            Line::from(" If you discover any clues, share them with me. ")
                .style(Style::default().fg(Color::DarkGray)),
        );

    let mut lines: Vec<Line> = Vec::new();
    for msg in &app.messages {
        lines.extend(message_lines(app, msg));
    }
    lines.extend(indicator_lines(app));

    let chat = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let border_color = if app.editing && !app.busy() {
        Color::Yellow
    } else {
        Color::DarkGray
    };

    let title = if app.editing {
        " Message "
    } else {
        " Message (i to edit) "
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input.cursor;

    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .input
        .text
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let text_style = if app.phase == GamePhase::Broken {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::Cyan)
    };

    let input = Paragraph::new(visible_text).style(text_style).block(block);
    frame.render_widget(input, area);

    if app.editing && matches!(app.overlay, Overlay::None) {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints: Vec<Span> = Vec::new();
    if app.editing {
        hints.extend(vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" browse ", label_style),
        ]);
    } else {
        hints.extend(vec![
            Span::styled(" i ", key_style),
            Span::styled(" type ", label_style),
            Span::styled(" j/k ", key_style),
            Span::styled(" scroll ", label_style),
        ]);
        if app.scenario.modalities.qr {
            hints.extend(vec![
                Span::styled(" c ", key_style),
                Span::styled(" scan ", label_style),
            ]);
        }
        if app.scenario.modalities.voice {
            hints.extend(vec![
                Span::styled(" v ", key_style),
                Span::styled(" record ", label_style),
            ]);
        }
        if app.scenario.modalities.image {
            hints.extend(vec![
                Span::styled(" u ", key_style),
                Span::styled(" upload ", label_style),
            ]);
        }
        hints.extend(vec![
            Span::styled(" t ", key_style),
            Span::styled(" clock ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ]);
    }

    let footer = Paragraph::new(Line::from(hints));
    frame.render_widget(footer, area);
}

fn centered_popup(area: Rect, width: u16, height: u16) -> Rect {
    let popup_width = width.min(area.width.saturating_sub(4));
    let popup_height = height.min(area.height.saturating_sub(4));
    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;
    Rect::new(popup_x, popup_y, popup_width, popup_height)
}

fn render_prompt_overlay(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    instructions: &str,
    edit: &crate::app::LineEdit,
) {
    let popup_area = centered_popup(area, 60, 7);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(format!(" {title} "));

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let instructions = Paragraph::new(instructions).style(Style::default().fg(Color::DarkGray));
    let instructions_area = Rect::new(inner.x, inner.y, inner.width, 1);
    frame.render_widget(instructions, instructions_area);

    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);
    let input = Paragraph::new(edit.text.as_str()).style(Style::default().fg(Color::Cyan));
    frame.render_widget(input, input_area);

    let cursor_x = edit.cursor.min(input_area.width as usize) as u16;
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));

    let status = Paragraph::new("Enter to confirm, Esc to cancel")
        .style(Style::default().fg(Color::DarkGray));
    let status_area = Rect::new(inner.x, inner.y + 4, inner.width, 1);
    frame.render_widget(status, status_area);
}

fn render_scanner_overlay(app: &App, frame: &mut Frame, area: Rect) {
    if let Overlay::Scanner(edit) = &app.overlay {
        render_prompt_overlay(
            frame,
            area,
            "Scanner",
            "Point the camera at the code and enter what it decodes to.",
            edit,
        );
    }
}

fn render_upload_overlay(app: &App, frame: &mut Frame, area: Rect) {
    if let Overlay::Upload(edit) = &app.overlay {
        render_prompt_overlay(
            frame,
            area,
            "Send a photo",
            "Enter the path of the photo to send.",
            edit,
        );
    }
}
