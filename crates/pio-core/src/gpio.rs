//! User GPIO bank: function multiplexing, override stages and pad loopback.
//!
//! The bank owns all 32 terminals. Each PIO block drives its own output and
//! output-enable latches here; a terminal only forwards a block's latches to
//! its pad when its function select names that block.

use crate::bit::{Bit, Direction, PinState};

/// Number of user GPIO terminals.
pub const GPIO_COUNT: usize = 32;

/// Number of PIO blocks that can own pins.
pub const PIO_BLOCKS: usize = 2;

/// `FUNCSEL` value of a terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Function {
    Xip = 0,
    Spi = 1,
    Uart = 2,
    I2c = 3,
    Pwm = 4,
    Sio = 5,
    Pio0 = 6,
    Pio1 = 7,
    Clock = 8,
    Usb = 9,
    /// No peripheral connected (reset value).
    #[default]
    Null = 0x1F,
}

impl Function {
    /// Decodes a 5-bit field. Unassigned values select nothing.
    #[must_use]
    pub const fn from_u5(value: u32) -> Self {
        match value & 0x1F {
            0 => Self::Xip,
            1 => Self::Spi,
            2 => Self::Uart,
            3 => Self::I2c,
            4 => Self::Pwm,
            5 => Self::Sio,
            6 => Self::Pio0,
            7 => Self::Pio1,
            8 => Self::Clock,
            9 => Self::Usb,
            _ => Self::Null,
        }
    }

    /// Function select value for PIO block `pio`.
    #[must_use]
    pub const fn pio(pio: usize) -> Self {
        if pio == 0 {
            Self::Pio0
        } else {
            Self::Pio1
        }
    }

    /// PIO block index served by this function, if any.
    #[must_use]
    pub const fn pio_index(self) -> Option<usize> {
        match self {
            Self::Pio0 => Some(0),
            Self::Pio1 => Some(1),
            _ => None,
        }
    }

    /// Raw field value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self as u32
    }
}

/// One override stage (`OUTOVER`, `OEOVER`, `INOVER`, `IRQOVER`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum Override {
    /// Pass the signal through.
    #[default]
    Bypass = 0,
    /// Invert the signal.
    Invert = 1,
    /// Force low (or input).
    AlwaysLow = 2,
    /// Force high (or output).
    AlwaysHigh = 3,
}

impl Override {
    /// Decodes a 2-bit field.
    #[must_use]
    pub const fn from_u2(value: u32) -> Self {
        match value & 0x3 {
            0 => Self::Bypass,
            1 => Self::Invert,
            2 => Self::AlwaysLow,
            _ => Self::AlwaysHigh,
        }
    }

    /// Raw field value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self as u32
    }

    /// Applies the stage to a level.
    #[must_use]
    pub const fn apply(self, level: Bit) -> Bit {
        match self {
            Self::Bypass => level,
            Self::Invert => level.inverted(),
            Self::AlwaysLow => Bit::Low,
            Self::AlwaysHigh => Bit::High,
        }
    }

    /// Applies the stage to a direction (low = input, high = output).
    #[must_use]
    pub const fn apply_direction(self, direction: Direction) -> Direction {
        Direction::from_bit(self.apply(direction.to_bit()))
    }
}

/// Per-terminal configuration plus the external input latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Terminal {
    /// Function select.
    pub function: Function,
    /// Output level override.
    pub out_override: Override,
    /// Output enable override.
    pub oe_override: Override,
    /// Input-to-peripheral override.
    pub in_override: Override,
    /// Interrupt-to-processor override.
    pub irq_override: Override,
    /// Level applied to the pad from outside the chip.
    pub external_input: Bit,
}

impl Terminal {
    /// Packs the configuration into a `GPIOn_CTRL` value.
    #[must_use]
    pub const fn ctrl(&self) -> u32 {
        self.function.value()
            | (self.out_override.value() << 8)
            | (self.oe_override.value() << 12)
            | (self.in_override.value() << 16)
            | (self.irq_override.value() << 28)
    }

    /// Applies a `GPIOn_CTRL` value.
    pub const fn set_ctrl(&mut self, ctrl: u32) {
        self.function = Function::from_u5(ctrl);
        self.out_override = Override::from_u2(ctrl >> 8);
        self.oe_override = Override::from_u2(ctrl >> 12);
        self.in_override = Override::from_u2(ctrl >> 16);
        self.irq_override = Override::from_u2(ctrl >> 28);
    }
}

/// The GPIO bank.
///
/// Block indices passed to the PIO latch accessors must be below
/// [`PIO_BLOCKS`]. Pin numbers wrap at [`GPIO_COUNT`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Gpio {
    terminals: [Terminal; GPIO_COUNT],
    pio_levels: [u32; PIO_BLOCKS],
    pio_directions: [u32; PIO_BLOCKS],
}

const fn pin_bit(pin: usize) -> u32 {
    1 << (pin % GPIO_COUNT)
}

impl Gpio {
    /// Creates a bank in its reset state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores reset state, including external inputs.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Terminal `pin`.
    #[must_use]
    pub const fn terminal(&self, pin: usize) -> &Terminal {
        &self.terminals[pin % GPIO_COUNT]
    }

    /// Mutable terminal `pin`.
    pub const fn terminal_mut(&mut self, pin: usize) -> &mut Terminal {
        &mut self.terminals[pin % GPIO_COUNT]
    }

    /// Selects the function of `pin`.
    pub const fn set_function(&mut self, pin: usize, function: Function) {
        self.terminal_mut(pin).function = function;
    }

    /// Output latch of PIO block `pio` for `pin`.
    #[must_use]
    pub const fn pio_pin_level(&self, pio: usize, pin: usize) -> Bit {
        Bit::from_lsb(self.pio_levels[pio] >> (pin % GPIO_COUNT))
    }

    /// Writes the output latch of PIO block `pio` for `pin`.
    pub const fn set_pio_pin_level(&mut self, pio: usize, pin: usize, level: Bit) {
        let latches = &mut self.pio_levels[pio];
        *latches = (*latches & !pin_bit(pin)) | (level.value() << (pin % GPIO_COUNT));
    }

    /// Direction latch of PIO block `pio` for `pin`.
    #[must_use]
    pub const fn pio_pin_direction(&self, pio: usize, pin: usize) -> Direction {
        Direction::from_lsb(self.pio_directions[pio] >> (pin % GPIO_COUNT))
    }

    /// Writes the direction latch of PIO block `pio` for `pin`.
    pub const fn set_pio_pin_direction(&mut self, pio: usize, pin: usize, direction: Direction) {
        let latches = &mut self.pio_directions[pio];
        *latches = (*latches & !pin_bit(pin)) | (direction.value() << (pin % GPIO_COUNT));
    }

    /// All 32 output latches of PIO block `pio`.
    #[must_use]
    pub const fn pio_levels(&self, pio: usize) -> u32 {
        self.pio_levels[pio]
    }

    /// All 32 direction latches of PIO block `pio` (1 = output).
    #[must_use]
    pub const fn pio_directions(&self, pio: usize) -> u32 {
        self.pio_directions[pio]
    }

    /// Clears the latches of PIO block `pio`.
    pub const fn reset_pio_latches(&mut self, pio: usize) {
        self.pio_levels[pio] = 0;
        self.pio_directions[pio] = 0;
    }

    /// Sets the externally applied level of `pin`.
    pub const fn set_external_input(&mut self, pin: usize, level: Bit) {
        self.terminal_mut(pin).external_input = level;
    }

    /// External input levels of all pins.
    #[must_use]
    pub fn external_inputs(&self) -> u32 {
        self.mask_of(|gpio, pin| gpio.terminal(pin).external_input)
    }

    /// Applies external input levels for all pins.
    pub fn set_external_inputs(&mut self, levels: u32) {
        for (pin, terminal) in self.terminals.iter_mut().enumerate() {
            terminal.external_input = Bit::from_bit(levels, pin as u32);
        }
    }

    /// Output level presented by the selected peripheral.
    #[must_use]
    pub const fn output_from_peripheral(&self, pin: usize) -> Bit {
        match self.terminal(pin).function.pio_index() {
            Some(pio) => self.pio_pin_level(pio, pin),
            None => Bit::Low,
        }
    }

    /// Output enable presented by the selected peripheral.
    #[must_use]
    pub const fn oe_from_peripheral(&self, pin: usize) -> Direction {
        match self.terminal(pin).function.pio_index() {
            Some(pio) => self.pio_pin_direction(pio, pin),
            None => Direction::In,
        }
    }

    /// Output level after the output override.
    #[must_use]
    pub const fn output_to_pad(&self, pin: usize) -> Bit {
        self.terminal(pin)
            .out_override
            .apply(self.output_from_peripheral(pin))
    }

    /// Output enable after the output-enable override.
    #[must_use]
    pub const fn oe_to_pad(&self, pin: usize) -> Direction {
        self.terminal(pin)
            .oe_override
            .apply_direction(self.oe_from_peripheral(pin))
    }

    /// Level seen at the pad input: the pad output when driven, the external
    /// input otherwise.
    #[must_use]
    pub const fn pad_in(&self, pin: usize) -> Bit {
        match self.oe_to_pad(pin) {
            Direction::Out => self.output_to_pad(pin),
            Direction::In => self.terminal(pin).external_input,
        }
    }

    /// Level delivered to peripherals after the input override.
    #[must_use]
    pub const fn input_to_peripheral(&self, pin: usize) -> Bit {
        self.terminal(pin).in_override.apply(self.pad_in(pin))
    }

    /// Interrupt level delivered to the processors after the IRQ override.
    #[must_use]
    pub const fn irq_to_processor(&self, pin: usize) -> Bit {
        self.terminal(pin).irq_override.apply(self.pad_in(pin))
    }

    /// Direction and pad level of `pin`.
    #[must_use]
    pub const fn pin_state(&self, pin: usize) -> PinState {
        PinState::new(self.oe_to_pad(pin), self.pad_in(pin))
    }

    /// `GPIOn_STATUS` value.
    #[must_use]
    pub const fn status(&self, pin: usize) -> u32 {
        let pad_in = self.pad_in(pin).value();
        (self.output_from_peripheral(pin).value() << 8)
            | (self.output_to_pad(pin).value() << 9)
            | (self.oe_from_peripheral(pin).value() << 12)
            | (self.oe_to_pad(pin).value() << 13)
            | (pad_in << 17)
            | (self.input_to_peripheral(pin).value() << 19)
            | (pad_in << 24)
            | (self.irq_to_processor(pin).value() << 26)
    }

    /// Pad input levels of all pins.
    #[must_use]
    pub fn pad_in_mask(&self) -> u32 {
        self.mask_of(|gpio, pin| gpio.pad_in(pin))
    }

    /// Pad output levels of all pins.
    #[must_use]
    pub fn pad_out_mask(&self) -> u32 {
        self.mask_of(|gpio, pin| gpio.output_to_pad(pin))
    }

    /// Pad output enables of all pins (1 = output).
    #[must_use]
    pub fn pad_oe_mask(&self) -> u32 {
        self.mask_of(|gpio, pin| gpio.oe_to_pad(pin).to_bit())
    }

    /// Inputs as seen by peripherals, for all pins.
    #[must_use]
    pub fn peripheral_inputs(&self) -> u32 {
        self.mask_of(|gpio, pin| gpio.input_to_peripheral(pin))
    }

    /// One character per pin, GPIO0 first (see [`PinState::as_char`]).
    #[must_use]
    pub fn render_pins(&self) -> String {
        (0..GPIO_COUNT).map(|pin| self.pin_state(pin).as_char()).collect()
    }

    fn mask_of<F>(&self, level: F) -> u32
    where
        F: Fn(&Self, usize) -> Bit,
    {
        (0..GPIO_COUNT).fold(0, |mask, pin| mask | (level(self, pin).value() << pin))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{Function, Gpio, Override};
    use crate::bit::{Bit, Direction};

    #[rstest]
    #[case(Override::Bypass, Bit::High, Bit::High)]
    #[case(Override::Invert, Bit::High, Bit::Low)]
    #[case(Override::AlwaysLow, Bit::High, Bit::Low)]
    #[case(Override::AlwaysHigh, Bit::Low, Bit::High)]
    fn override_stage_applies(#[case] stage: Override, #[case] input: Bit, #[case] output: Bit) {
        assert_eq!(stage.apply(input), output);
    }

    #[test]
    fn unselected_pio_does_not_reach_pad() {
        let mut gpio = Gpio::new();
        gpio.set_pio_pin_level(0, 3, Bit::High);
        gpio.set_pio_pin_direction(0, 3, Direction::Out);
        assert_eq!(gpio.oe_to_pad(3), Direction::In);
        gpio.set_function(3, Function::Pio1);
        assert_eq!(gpio.output_to_pad(3), Bit::Low);
        gpio.set_function(3, Function::Pio0);
        assert_eq!(gpio.output_to_pad(3), Bit::High);
        assert_eq!(gpio.oe_to_pad(3), Direction::Out);
    }

    #[test]
    fn driven_pad_loops_back_to_input() {
        let mut gpio = Gpio::new();
        gpio.set_function(5, Function::Pio0);
        gpio.set_external_input(5, Bit::High);
        assert_eq!(gpio.pad_in(5), Bit::High);
        gpio.set_pio_pin_direction(0, 5, Direction::Out);
        assert_eq!(gpio.pad_in(5), Bit::Low);
        gpio.set_pio_pin_level(0, 5, Bit::High);
        assert_eq!(gpio.input_to_peripheral(5), Bit::High);
        gpio.terminal_mut(5).in_override = Override::Invert;
        assert_eq!(gpio.input_to_peripheral(5), Bit::Low);
    }

    #[test]
    fn ctrl_register_roundtrips_fields() {
        let mut gpio = Gpio::new();
        assert_eq!(gpio.terminal(0).ctrl(), 0x1F);
        gpio.terminal_mut(0).set_ctrl(0x3003_3106);
        let terminal = gpio.terminal(0);
        assert_eq!(terminal.function, Function::Pio0);
        assert_eq!(terminal.out_override, Override::Invert);
        assert_eq!(terminal.oe_override, Override::AlwaysHigh);
        assert_eq!(terminal.in_override, Override::AlwaysHigh);
        assert_eq!(terminal.irq_override, Override::AlwaysHigh);
        assert_eq!(terminal.ctrl(), 0x3003_3106);
    }

    #[test]
    fn status_reports_forced_output() {
        let mut gpio = Gpio::new();
        gpio.terminal_mut(1).set_ctrl(0x0000_331F);
        let status = gpio.status(1);
        assert_ne!(status & (1 << 9), 0);
        assert_ne!(status & (1 << 13), 0);
        assert_ne!(status & (1 << 17), 0);
        assert_eq!(gpio.render_pins().chars().nth(1), Some('1'));
    }
}
