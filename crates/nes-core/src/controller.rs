//! Standard controller ports ($4016/$4017)

use std::fmt;

/// Buttons in the order the shift register reports them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    A,
    B,
    Select,
    Start,
    Up,
    Down,
    Left,
    Right,
}

impl Button {
    /// Report order after a strobe
    pub const ALL: [Button; 8] = [
        Button::A,
        Button::B,
        Button::Select,
        Button::Start,
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
    ];
}

/// Button state provider, polled synchronously during a controller read
pub trait InputSource {
    fn is_pressed(&self, button: Button) -> bool;
}

/// Nothing connected: every button reads as released
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInput;

impl InputSource for NoInput {
    fn is_pressed(&self, _button: Button) -> bool {
        false
    }
}

/// Fixed button set, handy for scripted input
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ButtonState(pub u8);

impl ButtonState {
    pub fn with(mut self, button: Button) -> Self {
        self.0 |= 1 << button as u8;
        self
    }
}

impl InputSource for ButtonState {
    fn is_pressed(&self, button: Button) -> bool {
        self.0 & (1 << button as u8) != 0
    }
}

/// One controller port
pub struct Controller {
    source: Box<dyn InputSource>,
    strobe: bool,
    index: u8,
}

impl Controller {
    pub fn new() -> Self {
        Self::with_source(Box::new(NoInput))
    }

    pub fn with_source(source: Box<dyn InputSource>) -> Self {
        Self {
            source,
            strobe: false,
            index: 0,
        }
    }

    pub fn set_source(&mut self, source: Box<dyn InputSource>) {
        self.source = source;
    }

    /// $4016 write, bit 0 is the strobe
    pub fn write_strobe(&mut self, value: u8) {
        self.strobe = value & 1 != 0;
        if self.strobe {
            self.index = 0;
        }
    }

    /// Next button bit; 0 once all eight have been read
    pub fn read(&mut self) -> u8 {
        let bit = self.peek();
        if !self.strobe && self.index < 8 {
            self.index += 1;
        }
        bit
    }

    /// Same bit as `read` without advancing
    pub fn peek(&self) -> u8 {
        match Button::ALL.get(self.index as usize) {
            Some(&button) => self.source.is_pressed(button) as u8,
            None => 0,
        }
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("strobe", &self.strobe)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_sequence() {
        let input = ButtonState::default().with(Button::A).with(Button::Start).with(Button::Right);
        let mut pad = Controller::with_source(Box::new(input));
        pad.write_strobe(1);
        pad.write_strobe(0);

        let bits: Vec<u8> = (0..8).map(|_| pad.read()).collect();
        assert_eq!(bits, vec![1, 0, 0, 1, 0, 0, 0, 1]);
        assert_eq!(pad.read(), 0);
        assert_eq!(pad.read(), 0);
    }

    #[test]
    fn test_strobe_high_repeats_a() {
        let mut pad = Controller::with_source(Box::new(ButtonState::default().with(Button::A)));
        pad.write_strobe(1);
        assert_eq!(pad.read(), 1);
        assert_eq!(pad.read(), 1);
    }

    #[test]
    fn test_restrobe_restarts_sequence() {
        let mut pad = Controller::with_source(Box::new(ButtonState::default().with(Button::B)));
        pad.write_strobe(1);
        pad.write_strobe(0);
        assert_eq!(pad.read(), 0);
        assert_eq!(pad.read(), 1);
        pad.write_strobe(1);
        pad.write_strobe(0);
        assert_eq!(pad.read(), 0);
        assert_eq!(pad.read(), 1);
    }
}
