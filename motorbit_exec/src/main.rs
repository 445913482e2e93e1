//! # Motor:bit Executable
//!
//! Runs a demand script against a Motor:bit board:
//! - On the Raspberry Pi the board is driven over the I2C bus given in the parameters
//! - Anywhere else (or with `simulate = true`) a simulated board is used
//!
//! Usage: `motorbit_exec <script>`

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Parameters for the executable.
mod params;

/// Demand script interpreter.
mod script;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Result,
};
use embedded_hal::blocking::{
    delay::DelayMs,
    i2c::{Write, WriteRead},
};
use log::{debug, info, warn};
use std::env;
use std::fmt::Debug;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use motorbit::{
    pca9685::{prescale_for, DEFAULT_FREQUENCY_HZ},
    sim::SimBus,
    Error, MotorBit,
};
use params::ExecParams;
use script::{PendingDemands, ScriptInterpreter};
use util::{logger::logger_init, session::Session};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Target period of one cycle.
const CYCLE_PERIOD_S: f64 = 0.10;

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new(
        "motorbit_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Parameters come before the logger since they carry the log levels
    let params: ExecParams = util::params::load("motorbit_exec.toml")
        .wrap_err("Could not load exec params")?;
    params.are_valid().wrap_err("Exec params are invalid")?;

    // Initialise logger
    logger_init(params.log_level, &params.log_targets(), &session)
        .wrap_err("Failed to initialise logging")?;

    info!("Motor:bit Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    info!("Initialising...");
    debug!("{:#?}", params);

    // ---- LOAD SCRIPT ----

    let args: Vec<String> = env::args().collect();

    if args.len() != 2 {
        return Err(eyre!(
            "Expected the script path as the only argument, found {} arguments", args.len() - 1
        ));
    }

    info!("Loading script from \"{}\"", &args[1]);

    let script = ScriptInterpreter::new(&args[1])
        .wrap_err("Failed to load script")?;

    info!(
        "Loaded script lasts {:.02} s and contains {} demands\n",
        script.get_duration(),
        script.get_num_demands()
    );

    // ---- BOARD INITIALISATION ----

    if params.simulate || !cfg!(target_arch = "arm") {
        info!("Using the simulated board at {:#04x}", params.address);

        let bus = SimBus::new(params.address);
        let delay = bus.delay();

        let mb = MotorBit::with_address(bus, delay, params.address)
            .wrap_err("Failed to initialise the simulated board")?;

        run(mb, &params, script)
    }
    else {
        run_hardware(&params, script)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

#[cfg(target_arch = "arm")]
fn run_hardware(params: &ExecParams, script: ScriptInterpreter) -> Result<()> {
    use rppal::{hal::Delay, i2c::I2c};

    info!("Using the board at {:#04x} on /dev/i2c-{}", params.address, params.i2c_bus);

    let i2c = I2c::with_bus(params.i2c_bus)
        .wrap_err("Failed to open the I2C bus")?;

    let mb = MotorBit::with_address(i2c, Delay::new(), params.address)
        .wrap_err("Failed to initialise the board")?;

    run(mb, params, script)
}

#[cfg(not(target_arch = "arm"))]
fn run_hardware(_params: &ExecParams, _script: ScriptInterpreter) -> Result<()> {
    Err(eyre!("Hardware I2C is only available on the Raspberry Pi, set `simulate = true`"))
}

/// Reprogram the PWM frequency if the configured one needs a different prescale.
fn apply_frequency<I2C, D, E>(mb: &mut MotorBit<I2C, D>, params: &ExecParams) -> Result<()>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
    D: DelayMs<u8>,
    E: Debug + Send + Sync + 'static
{
    if prescale_for(params.frequency_hz) == mb.pca9685().prescale() {
        return Ok(())
    }

    mb.pca9685_mut()
        .set_frequency(params.frequency_hz)
        .wrap_err("Failed to set the PWM frequency")?;
    warn!(
        "Running at {} Hz, servo angles assume {} Hz",
        params.frequency_hz, DEFAULT_FREQUENCY_HZ
    );

    Ok(())
}

/// Execute the script against an initialised board, stopping all motors at the end.
fn run<I2C, D, E>(
    mut mb: MotorBit<I2C, D>,
    params: &ExecParams,
    mut script: ScriptInterpreter
) -> Result<()>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
    D: DelayMs<u8>,
    E: Debug + Send + Sync + 'static
{
    apply_frequency(&mut mb, params)?;

    info!("Initialisation complete, running script");

    let start = Instant::now();

    loop {
        let cycle_start = Instant::now();

        match script.get_pending(start.elapsed().as_secs_f64()) {
            PendingDemands::None => (),
            PendingDemands::Some(dems) => {
                for dem in dems {
                    match dem.apply(&mut mb) {
                        Ok(_) => info!("Actuated {:?}", dem),
                        Err(Error::OutOfRange(e)) => warn!("Rejected {:?}: {}", dem, e),
                        Err(e @ Error::I2c(_)) => {
                            return Err(e).wrap_err("Bus error while actuating demands")
                        }
                    }
                }
            },
            PendingDemands::EndOfScript => {
                info!("End of script reached");
                break
            }
        }

        // Sleep for the rest of the cycle
        let cycle_dur = Instant::now() - cycle_start;
        match Duration::from_secs_f64(CYCLE_PERIOD_S).checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => warn!("Cycle overran by {:.06} s", cycle_dur.as_secs_f64() - CYCLE_PERIOD_S)
        }
    }

    info!("Stopping all motors");
    mb.stop_all().wrap_err("Failed to stop the motors")?;

    info!("End of execution");

    Ok(())
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
