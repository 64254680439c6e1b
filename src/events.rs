use std::io;
use std::time::Duration;

use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEventKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    Tick,
    Quit,
    Cancel,
    NextPane,
    MoveUp,
    MoveDown,
    CursorLeft,
    CursorRight,
    CursorHome,
    CursorEnd,
    ScrollUp,
    ScrollDown,
    PageUp,
    PageDown,
    InputChar(char),
    Newline,
    Backspace,
    Submit,
}

fn map_key_event(key_event: KeyEvent) -> AppEvent {
    if key_event.kind != KeyEventKind::Press {
        return AppEvent::Tick;
    }
    let control = key_event.modifiers.contains(KeyModifiers::CONTROL);
    let shifted = key_event.modifiers.contains(KeyModifiers::SHIFT);
    let alt = key_event.modifiers.contains(KeyModifiers::ALT);

    match key_event.code {
        KeyCode::Char('c') if control => AppEvent::Quit,
        KeyCode::Char('u') if control => AppEvent::PageUp,
        KeyCode::Char('d') if control => AppEvent::PageDown,
        KeyCode::Char('a') if control => AppEvent::CursorHome,
        KeyCode::Char('e') if control => AppEvent::CursorEnd,
        KeyCode::Char('j') if control => AppEvent::Newline,
        KeyCode::Esc => AppEvent::Cancel,
        KeyCode::Tab => AppEvent::NextPane,
        KeyCode::Up if shifted || control => AppEvent::ScrollUp,
        KeyCode::Down if shifted || control => AppEvent::ScrollDown,
        KeyCode::PageUp => AppEvent::PageUp,
        KeyCode::PageDown => AppEvent::PageDown,
        KeyCode::Up => AppEvent::MoveUp,
        KeyCode::Down => AppEvent::MoveDown,
        KeyCode::Left => AppEvent::CursorLeft,
        KeyCode::Right => AppEvent::CursorRight,
        KeyCode::Home => AppEvent::CursorHome,
        KeyCode::End => AppEvent::CursorEnd,
        KeyCode::Backspace => AppEvent::Backspace,
        KeyCode::Enter if alt || shifted => AppEvent::Newline,
        KeyCode::Enter => AppEvent::Submit,
        KeyCode::Char(c) if !control => AppEvent::InputChar(c),
        _ => AppEvent::Tick,
    }
}

fn map_mouse_event_kind(kind: MouseEventKind) -> AppEvent {
    match kind {
        MouseEventKind::ScrollUp => AppEvent::ScrollUp,
        MouseEventKind::ScrollDown => AppEvent::ScrollDown,
        _ => AppEvent::Tick,
    }
}

pub fn next_event() -> io::Result<AppEvent> {
    if event::poll(Duration::from_millis(16))? {
        match event::read()? {
            Event::Key(key_event) => return Ok(map_key_event(key_event)),
            Event::Mouse(mouse_event) => return Ok(map_mouse_event_kind(mouse_event.kind)),
            _ => {}
        }
    }
    Ok(AppEvent::Tick)
}
