use std::time::Duration;
use tracing::trace;

use crate::api::Backend;
use crate::config::SVConfig;
use crate::domain::{Message, SVError};
use crate::model::Model;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(config: &SVConfig) -> Self {
        Self {
            event_poll_time: config.event_poll_time,
        }
    }

    /// Waits up to the poll time for a terminal event. Key presses are passed
    /// through untouched while the model reads command line input.
    pub fn handle_event<B: Backend>(&self, model: &Model<B>) -> Result<Option<Message>, SVError> {
        if !event::poll(Duration::from_millis(self.event_poll_time))? {
            return Ok(None);
        }
        match event::read()? {
            Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                if model.raw_keyevents() {
                    Ok(Some(Message::RawKey(key)))
                } else {
                    Ok(self.handle_key(key))
                }
            }
            Event::Resize(width, height) => Ok(Some(Message::Resize(width as usize, height as usize))),
            _ => Ok(None),
        }
    }

    fn handle_key(&self, key: event::KeyEvent) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Esc, _) => Some(Message::Exit),
            (KeyCode::Enter, _) => Some(Message::Enter),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            (KeyCode::Tab, _) => Some(Message::NextTab),
            (KeyCode::BackTab, _) => Some(Message::PreviousTab),
            (KeyCode::Up, _) | (KeyCode::Char('k'), _) => Some(Message::MoveUp),
            (KeyCode::Down, _) | (KeyCode::Char('j'), _) => Some(Message::MoveDown),
            (KeyCode::Left, _) | (KeyCode::Char('h'), _) => Some(Message::MoveLeft),
            (KeyCode::Right, _) | (KeyCode::Char('l'), _) => Some(Message::MoveRight),
            (KeyCode::PageDown, _) | (KeyCode::Char('n'), _) => Some(Message::NextPage),
            (KeyCode::PageUp, _) | (KeyCode::Char('p'), _) => Some(Message::PreviousPage),
            (KeyCode::Char('+'), _) => Some(Message::LargerPages),
            (KeyCode::Char('-'), _) => Some(Message::SmallerPages),
            (KeyCode::Char('s'), _) => Some(Message::Sort),
            (KeyCode::Char('f'), _) => Some(Message::Filter),
            (KeyCode::Char('c'), _) => Some(Message::ClearFilters),
            (KeyCode::Char('d'), _) => Some(Message::Download),
            (KeyCode::Char('u'), _) => Some(Message::Upload),
            (KeyCode::Char('e'), _) => Some(Message::EditName),
            (KeyCode::Char('b'), _) => Some(Message::EditBirthDate),
            (KeyCode::Char('i'), _) => Some(Message::EditImage),
            (KeyCode::Char('r'), _) => Some(Message::Refresh),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyEvent;

    fn map(code: KeyCode, modifiers: KeyModifiers) -> Option<Message> {
        Controller::new(&SVConfig::default()).handle_key(KeyEvent::new(code, modifiers))
    }

    #[test]
    fn keys_map_to_messages() {
        assert_eq!(map(KeyCode::Char('q'), KeyModifiers::NONE), Some(Message::Quit));
        assert_eq!(map(KeyCode::Char('c'), KeyModifiers::CONTROL), Some(Message::Quit));
        assert_eq!(map(KeyCode::Char('c'), KeyModifiers::NONE), Some(Message::ClearFilters));
        assert_eq!(map(KeyCode::Char('j'), KeyModifiers::NONE), Some(Message::MoveDown));
        assert_eq!(map(KeyCode::BackTab, KeyModifiers::SHIFT), Some(Message::PreviousTab));
        assert_eq!(map(KeyCode::Char('+'), KeyModifiers::SHIFT), Some(Message::LargerPages));
        assert_eq!(map(KeyCode::Char('d'), KeyModifiers::NONE), Some(Message::Download));
        assert_eq!(map(KeyCode::Char('i'), KeyModifiers::NONE), Some(Message::EditImage));
        assert_eq!(map(KeyCode::Char('x'), KeyModifiers::NONE), None);
    }
}
