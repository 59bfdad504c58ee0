//! Emulator assembly: chip state, the clock and the driving gear.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, info};

use crate::address::LocalAddressSpace;
use crate::bit::Direction;
use crate::clock::{ClockListener, ClockMode, DrivingGear, MasterClock, DEFAULT_FREQUENCY};
use crate::error::{AccessError, ProgramError};
use crate::gpio::{Function, Gpio, GPIO_COUNT, PIO_BLOCKS};
use crate::pio::Pio;
use crate::program::Program;
use crate::sm::SM_COUNT;

/// Rejects `value` unless it is below `limit`.
fn check_range(field: &'static str, value: usize, limit: usize) -> Result<(), AccessError> {
    if value < limit {
        Ok(())
    } else {
        Err(AccessError::ValueOutOfRange {
            field,
            value: u32::try_from(value).unwrap_or(u32::MAX),
        })
    }
}

/// Emulator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct EmulatorConfig {
    /// Clock mode at start.
    pub clock_mode: ClockMode,
    /// Target frequency in 1/8 Hz units (`0` = unbounded).
    pub frequency: u32,
    /// Emit a `warn!` event for every instruction that fails to decode.
    pub log_decode_failures: bool,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            clock_mode: ClockMode::SingleStep,
            frequency: DEFAULT_FREQUENCY,
            log_decode_failures: true,
        }
    }
}

/// All mutable peripheral state behind one lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chip {
    /// GPIO bank.
    pub gpio: Gpio,
    /// PIO blocks.
    pub pio: [Pio; PIO_BLOCKS],
}

impl Default for Chip {
    fn default() -> Self {
        Self::new()
    }
}

impl Chip {
    /// Creates the chip in its reset state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            gpio: Gpio::new(),
            pio: [Pio::new(0), Pio::new(1)],
        }
    }

    /// Resets GPIO and both PIO blocks. Breakpoints and tracepoints survive.
    pub fn reset(&mut self) {
        self.gpio.reset();
        for pio in &mut self.pio {
            pio.reset();
        }
    }

    /// Loads `program` into block `pio` at its load offset.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::DoesNotFit`] when the program runs past the
    /// end of instruction memory and [`ProgramError::Target`] when `pio`
    /// names no block.
    pub fn load_program(&mut self, pio: usize, program: &Program) -> Result<(), ProgramError> {
        check_range("pio", pio, PIO_BLOCKS)?;
        let block = &mut self.pio[pio];
        block.load(program.load_offset(), &program.instructions)?;
        debug!(
            pio = block.index(),
            origin = program.load_offset(),
            words = program.len(),
            "program loaded"
        );
        Ok(())
    }

    /// Points state machine `sm` of block `pio` at `program`: PC at the load
    /// offset and the wrap window around the program.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::ValueOutOfRange`] when `pio` or `sm` names no
    /// unit.
    pub fn prepare_state_machine(
        &mut self,
        pio: usize,
        sm: usize,
        program: &Program,
    ) -> Result<(), AccessError> {
        check_range("pio", pio, PIO_BLOCKS)?;
        check_range("sm", sm, SM_COUNT)?;
        let (bottom, top) = program.wrap();
        let machine = self.pio[pio].sm_mut(sm);
        machine.registers_mut().pc = bottom;
        let config = machine.config_mut();
        config.wrap_bottom = bottom;
        config.wrap_top = top;
        Ok(())
    }

    /// Hands `count` pins starting at `base` to block `pio` as outputs.
    /// Pin numbers past 31 wrap to 0.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::ValueOutOfRange`] for an unknown block, a base
    /// past the last pin or more than 32 pins.
    pub fn route_pins(&mut self, pio: usize, base: usize, count: usize) -> Result<(), AccessError> {
        check_range("pio", pio, PIO_BLOCKS)?;
        check_range("base", base, GPIO_COUNT)?;
        check_range("count", count, GPIO_COUNT + 1)?;
        for offset in 0..count {
            let pin = (base + offset) % GPIO_COUNT;
            self.gpio.set_function(pin, Function::pio(pio));
            self.gpio.set_pio_pin_direction(pio, pin, Direction::Out);
        }
        Ok(())
    }

    /// Phase 0 for both blocks. Returns `true` on a breakpoint hit.
    pub fn raising_edge(&mut self, log_decode_failures: bool) -> bool {
        self.pio.iter_mut().fold(false, |hit, pio| {
            pio.raising_edge(log_decode_failures).breakpoint_hit || hit
        })
    }

    /// Phase 1 for both blocks.
    pub fn falling_edge(&mut self) {
        let Self { gpio, pio } = self;
        for block in pio {
            block.falling_edge(gpio);
        }
    }
}

/// Clock listener owning the chip state.
#[derive(Debug)]
pub struct Peripherals {
    chip: Mutex<Chip>,
    clock: Weak<MasterClock>,
    log_decode_failures: bool,
}

impl Peripherals {
    /// Wraps a fresh chip driven by `clock`.
    #[must_use]
    pub fn new(clock: Weak<MasterClock>, log_decode_failures: bool) -> Self {
        Self {
            chip: Mutex::new(Chip::new()),
            clock,
            log_decode_failures,
        }
    }

    /// Locks the chip state.
    pub fn lock(&self) -> MutexGuard<'_, Chip> {
        self.chip.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ClockListener for Peripherals {
    fn raising_edge(&self, wall_clock: u64) {
        let hit = self.lock().raising_edge(self.log_decode_failures);
        if hit {
            info!(wall_clock, "breakpoint hit, switching to single step");
            if let Some(clock) = self.clock.upgrade() {
                clock.set_mode(ClockMode::SingleStep);
            }
        }
    }

    fn falling_edge(&self, _wall_clock: u64) {
        self.lock().falling_edge();
    }
}

/// A complete emulator instance.
pub struct Emulator {
    config: EmulatorConfig,
    clock: Arc<MasterClock>,
    peripherals: Arc<Peripherals>,
    listener: Arc<dyn ClockListener>,
    gear: Option<DrivingGear>,
}

impl std::fmt::Debug for Emulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emulator")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("running", &self.gear.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new(EmulatorConfig::default())
    }
}

impl Emulator {
    /// Builds the clock and the chip. The driving gear is not started.
    #[must_use]
    pub fn new(config: EmulatorConfig) -> Self {
        let clock = Arc::new(MasterClock::new(config.clock_mode, config.frequency));
        let peripherals = Arc::new(Peripherals::new(
            Arc::downgrade(&clock),
            config.log_decode_failures,
        ));
        let listener: Arc<dyn ClockListener> = peripherals.clone();
        clock.add_listener(&listener);
        Self {
            config,
            clock,
            peripherals,
            listener,
            gear: None,
        }
    }

    /// Configuration the emulator was built with.
    #[must_use]
    pub const fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    /// The master clock.
    #[must_use]
    pub const fn clock(&self) -> &Arc<MasterClock> {
        &self.clock
    }

    /// The peripheral state.
    #[must_use]
    pub const fn peripherals(&self) -> &Arc<Peripherals> {
        &self.peripherals
    }

    /// An address space over this emulator.
    #[must_use]
    pub fn address_space(&self) -> LocalAddressSpace {
        LocalAddressSpace::new(Arc::clone(&self.clock), Arc::clone(&self.peripherals))
    }

    /// Starts the driving gear. A running gear is left alone.
    ///
    /// # Errors
    ///
    /// Returns the OS error when the gear thread cannot be spawned.
    pub fn start(&mut self) -> std::io::Result<()> {
        if self.gear.is_none() {
            self.gear = Some(DrivingGear::start(Arc::clone(&self.clock))?);
        }
        Ok(())
    }

    /// Stops the driving gear.
    pub fn stop(&mut self) {
        if let Some(mut gear) = self.gear.take() {
            gear.stop();
        }
    }

    /// `true` while the driving gear runs.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.gear.is_some()
    }

    /// Resets the chip state in place.
    pub fn reset(&self) {
        self.peripherals.lock().reset();
        debug!("emulator reset");
    }

    /// Loads `program` into block `pio`.
    ///
    /// # Errors
    ///
    /// See [`Chip::load_program`].
    pub fn load_program(&self, pio: usize, program: &Program) -> Result<(), ProgramError> {
        self.peripherals.lock().load_program(pio, program)
    }

    /// Runs `cycles` full clock cycles on the calling thread.
    pub fn step(&self, cycles: u64) {
        self.clock.step_cycles(cycles);
    }
}

impl Drop for Emulator {
    fn drop(&mut self) {
        self.stop();
        self.clock.remove_listener(&self.listener);
    }
}
