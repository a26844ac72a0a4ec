//! `ratatui` front-end: terminal setup, the event/render loop, and the input
//! router that decides whether a keystroke edits a field or drives the device.

use crate::app::{App, Focus};
use crate::log_debug;
use crate::presets::PRESET_KEYS;
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, BorderType, Borders, List, ListItem, ListState, Paragraph},
    Terminal,
};
use std::io;
use std::time::Duration;
use unicode_width::UnicodeWidthStr;

/// Configure the terminal, run the drawing loop, and tear everything down.
pub fn run_app(app: &mut App) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = app_loop(&mut terminal, app);

    drop(terminal);
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen);
    result
}

/// Core event/render loop.
fn app_loop(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    // Initial render so the panel appears immediately on startup.
    terminal.draw(|frame| draw(frame, app))?;

    loop {
        // Completed dispatches land in the log here, in completion order.
        let mut should_draw = app.poll_dispatch_jobs();

        let poll_duration = if app.has_active_jobs() {
            Duration::from_millis(50)
        } else {
            Duration::from_millis(100)
        };

        let mut should_quit = false;
        if event::poll(poll_duration)? {
            match event::read()? {
                Event::Key(key) => {
                    should_quit = handle_key_event(app, key)?;
                    should_draw = true;
                }
                Event::Resize(_, _) => {
                    should_draw = true;
                }
                _ => {}
            }
        }

        if should_draw {
            terminal.draw(|frame| draw(frame, app))?;
        }

        if should_quit {
            break;
        }
    }
    Ok(())
}

/// Route a keystroke. Field focus always wins: while a text field owns the
/// keyboard nothing is logged and no preset ever fires, so typing in the
/// raw-command or config fields cannot drive the device by accident. The two
/// "buttons" (save, quit) are deliberately not gated by focus.
pub(crate) fn handle_key_event(app: &mut App, key: KeyEvent) -> Result<bool> {
    log_debug(&format!(
        "Key event: {:?} with modifiers: {:?}",
        key.code, key.modifiers
    ));

    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Ok(true);
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('s') {
        app.save_config();
        return Ok(false);
    }

    match app.focus() {
        Focus::Ip | Focus::Port | Focus::Raw => handle_field_key(app, key),
        Focus::WrapCr => handle_checkbox_key(app, key),
        Focus::Palette => handle_palette_key(app, key),
        Focus::Global => handle_global_key(app, key),
    }
    Ok(false)
}

fn handle_field_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => {
            // Enter in the raw-command field is the send button.
            if app.focus() == Focus::Raw {
                app.send_raw();
            }
        }
        KeyCode::Backspace => app.backspace_field(),
        KeyCode::Tab => app.focus_next(),
        KeyCode::BackTab => app.focus_prev(),
        KeyCode::Esc => app.clear_focus(),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.push_field_char(c)
        }
        _ => {}
    }
}

fn handle_checkbox_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter | KeyCode::Char(' ') => app.toggle_wrap_cr(),
        KeyCode::Tab => app.focus_next(),
        KeyCode::BackTab => app.focus_prev(),
        KeyCode::Esc => app.clear_focus(),
        _ => {}
    }
}

fn handle_palette_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Up => app.palette_move_up(),
        KeyCode::Down => app.palette_move_down(),
        KeyCode::Enter => app.send_selected_preset(),
        KeyCode::Tab => app.focus_next(),
        KeyCode::BackTab => app.focus_prev(),
        KeyCode::Esc => app.clear_focus(),
        _ => {}
    }
}

/// Unfocused state: log every keydown for diagnostics, then map the
/// whitelisted keys to preset sends. Everything else is logged only.
fn handle_global_key(app: &mut App, key: KeyEvent) {
    app.log_keydown(&key_name(key.code));
    match key.code {
        KeyCode::Up => app.send_preset("up"),
        KeyCode::Down => app.send_preset("down"),
        KeyCode::Left => app.send_preset("left"),
        KeyCode::Right => app.send_preset("right"),
        KeyCode::Enter => app.send_preset("enter"),
        KeyCode::Tab => app.focus_next(),
        KeyCode::PageUp => app.page_up(),
        KeyCode::PageDown => app.page_down(),
        KeyCode::Home => app.scroll_to_top(),
        KeyCode::End => app.scroll_to_bottom(),
        _ => {}
    }
}

fn key_name(code: KeyCode) -> String {
    match code {
        KeyCode::Char(' ') => "Space".to_string(),
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Up => "Up".to_string(),
        KeyCode::Down => "Down".to_string(),
        KeyCode::Left => "Left".to_string(),
        KeyCode::Right => "Right".to_string(),
        KeyCode::Enter => "Enter".to_string(),
        other => format!("{other:?}"),
    }
}

const ACCENT: Color = Color::Rgb(90, 200, 250);
const DIM_BORDER: Color = Color::Rgb(70, 100, 120);
const LOG_TEXT: Color = Color::Rgb(205, 210, 205);
const FIELD_TEXT: Color = Color::Rgb(250, 220, 120);
const HELP_TEXT: Color = Color::Rgb(150, 155, 150);

fn border_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(ACCENT)
    } else {
        Style::default().fg(DIM_BORDER)
    }
}

/// Render config fields, log, preset palette, raw-command input, and help bar.
pub fn draw(frame: &mut ratatui::Frame<'_>, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let field_row = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(45),
            Constraint::Percentage(20),
            Constraint::Percentage(35),
        ])
        .split(chunks[0]);

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(20), Constraint::Length(20)])
        .split(chunks[1]);

    draw_text_field(
        frame,
        field_row[0],
        " Projector IP ",
        app.ip_field(),
        app.focus() == Focus::Ip,
    );
    draw_text_field(
        frame,
        field_row[1],
        " Port ",
        app.port_field(),
        app.focus() == Focus::Port,
    );

    let checkbox = if app.wrap_cr() {
        "[x] append <CR>"
    } else {
        "[ ] append <CR>"
    };
    let checkbox_block = Paragraph::new(checkbox)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(border_style(app.focus() == Focus::WrapCr))
                .title(" Wrap CR "),
        )
        .style(Style::default().fg(FIELD_TEXT));
    frame.render_widget(checkbox_block, field_row[2]);

    // Newest entry first; multi-line entries (reply bodies) span display rows.
    let log_lines: Vec<Line> = app
        .log_entries()
        .iter()
        .flat_map(|entry| entry.split('\n'))
        .map(Line::from)
        .collect();
    let log_block = Paragraph::new(Text::from(log_lines))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(DIM_BORDER))
                .title(Span::styled(
                    " Log ",
                    Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
                )),
        )
        .style(Style::default().fg(LOG_TEXT))
        .scroll((app.get_scroll_offset(), 0));
    frame.render_widget(log_block, middle[0]);

    let palette_focused = app.focus() == Focus::Palette;
    let items: Vec<ListItem> = PRESET_KEYS.iter().map(|key| ListItem::new(*key)).collect();
    let palette = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(border_style(palette_focused))
                .title(" Presets "),
        )
        .style(Style::default().fg(LOG_TEXT))
        .highlight_style(
            Style::default()
                .fg(if palette_focused { ACCENT } else { LOG_TEXT })
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
    let mut palette_state = ListState::default();
    palette_state.select(Some(app.palette_index()));
    frame.render_stateful_widget(palette, middle[1], &mut palette_state);

    draw_text_field(
        frame,
        chunks[2],
        " Raw command ",
        app.raw_field(),
        app.focus() == Focus::Raw,
    );

    let help = Paragraph::new(
        " Tab fields   Arrows/Enter presets   Ctrl+S save   Enter in raw field sends   Ctrl+C quit",
    )
    .style(Style::default().fg(HELP_TEXT));
    frame.render_widget(help, chunks[3]);

    if let Some(text) = app.focused_field_text() {
        let rect = match app.focus() {
            Focus::Ip => field_row[0],
            Focus::Port => field_row[1],
            Focus::Raw => chunks[2],
            _ => return,
        };
        set_field_cursor(frame, rect, text);
    }
}

fn draw_text_field(
    frame: &mut ratatui::Frame<'_>,
    rect: Rect,
    title: &str,
    value: &str,
    focused: bool,
) {
    let field = Paragraph::new(value)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(border_style(focused))
                .title(title.to_string()),
        )
        .style(Style::default().fg(FIELD_TEXT));
    frame.render_widget(field, rect);
}

fn set_field_cursor(frame: &mut ratatui::Frame<'_>, rect: Rect, text: &str) {
    let inner_width = rect.width.saturating_sub(2);
    let text_width = UnicodeWidthStr::width(text).min(u16::MAX as usize) as u16;
    let cursor_offset = text_width.min(inner_width);
    let cursor_x = rect.x.saturating_add(1).saturating_add(cursor_offset);
    let cursor_y = rect.y + 1;
    frame.set_cursor(cursor_x, cursor_y);
}
