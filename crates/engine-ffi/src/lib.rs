//! C ABI bindings for the embedded/mobile LP and Monte Carlo core (§6.3).
//!
//! Three exported functions, fixed-size result records, no heap
//! allocation crossing the boundary in either direction: the caller
//! owns every buffer, this crate only writes into what it's given.
//! Grounded in `engine_wire::port`'s framing discipline (decode, run,
//! report a status byte) minus the length-prefixed stream — the mobile
//! core is called in-process, not over a socket.
//!
//! # Safety
//!
//! Every `extern "C"` function here is `unsafe`: callers must uphold the
//! pointer/length contracts documented on each function. This crate
//! never panics across the FFI boundary — [`std::panic::catch_unwind`]
//! wraps every entry point, translating a caught panic into
//! [`Status::Error`], since unwinding into C is undefined behavior.

use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::slice;

use engine_core::{MonteCarloResult, SolveResult, SolveStatus, VariableVector};

/// Status codes returned by [`solve`] and [`monte_carlo`] (§6.3).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok = 0,
    Infeasible = 1,
    Error = 2,
    BadInput = 3,
}

const MAX_ROUTES: usize = engine_core::MAX_ROUTES;
const MAX_CONSTRAINTS: usize = engine_core::MAX_CONSTRAINTS;
const MAX_VARS: usize = engine_core::MAX_VARS;

/// Fixed-capacity result record for [`solve`] (§6.3).
///
/// Arrays beyond `n_routes`/`n_constraints` are zero-filled and must be
/// ignored by the caller.
#[repr(C)]
pub struct SolveRecord {
    pub n_routes: u8,
    pub n_constraints: u8,
    pub profit: f64,
    pub tons: f64,
    pub cost: f64,
    pub roi: f64,
    pub route_tons: [f64; MAX_ROUTES],
    pub route_profits: [f64; MAX_ROUTES],
    pub margins: [f64; MAX_ROUTES],
    pub shadow_prices: [f64; MAX_CONSTRAINTS],
}

impl Default for SolveRecord {
    fn default() -> Self {
        Self {
            n_routes: 0,
            n_constraints: 0,
            profit: 0.0,
            tons: 0.0,
            cost: 0.0,
            roi: 0.0,
            route_tons: [0.0; MAX_ROUTES],
            route_profits: [0.0; MAX_ROUTES],
            margins: [0.0; MAX_ROUTES],
            shadow_prices: [0.0; MAX_CONSTRAINTS],
        }
    }
}

impl SolveRecord {
    fn fill(&mut self, result: &SolveResult) {
        self.n_routes = result.route_tons.len().min(MAX_ROUTES) as u8;
        self.n_constraints = result.shadow_prices.len().min(MAX_CONSTRAINTS) as u8;
        self.profit = result.profit;
        self.tons = result.tons;
        self.cost = result.cost;
        self.roi = result.roi;
        copy_into(&mut self.route_tons, &result.route_tons);
        copy_into(&mut self.route_profits, &result.route_profits);
        copy_into(&mut self.margins, &result.margins);
        copy_into(&mut self.shadow_prices, &result.shadow_prices);
    }
}

/// Fixed-capacity result record for [`monte_carlo`] (§6.3).
#[repr(C)]
pub struct MonteCarloRecord {
    pub n_vars: u16,
    pub n_scenarios: u32,
    pub n_feasible: u32,
    pub n_infeasible: u32,
    pub mean: f64,
    pub stddev: f64,
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub min: f64,
    pub max: f64,
    pub sensitivity: [f64; MAX_VARS],
}

impl Default for MonteCarloRecord {
    fn default() -> Self {
        Self {
            n_vars: 0,
            n_scenarios: 0,
            n_feasible: 0,
            n_infeasible: 0,
            mean: 0.0,
            stddev: 0.0,
            p5: 0.0,
            p25: 0.0,
            p50: 0.0,
            p75: 0.0,
            p95: 0.0,
            min: 0.0,
            max: 0.0,
            sensitivity: [0.0; MAX_VARS],
        }
    }
}

impl MonteCarloRecord {
    fn fill(&mut self, n_scenarios: u32, result: &MonteCarloResult) {
        self.n_vars = result.sensitivity.len().min(MAX_VARS) as u16;
        self.n_scenarios = n_scenarios;
        self.n_feasible = result.feasible_count;
        self.n_infeasible = result.infeasible_count;
        self.mean = result.mean;
        self.stddev = result.stddev;
        self.p5 = result.p5;
        self.p25 = result.p25;
        self.p50 = result.p50;
        self.p75 = result.p75;
        self.p95 = result.p95;
        self.min = result.min;
        self.max = result.max;
        copy_into(&mut self.sensitivity, &result.sensitivity);
    }
}

fn copy_into(dest: &mut [f64], src: &[f64]) {
    let n = src.len().min(dest.len());
    dest[..n].copy_from_slice(&src[..n]);
}

/// Reads a descriptor and variable vector out of raw pointers, bounds-
/// checked against the declared lengths and the wire-format maxima
/// (§6.1) before anything touches the solver.
unsafe fn read_descriptor_and_vars(
    descriptor_ptr: *const u8,
    descriptor_len: usize,
    vars_ptr: *const f64,
    n_vars: usize,
) -> Result<(engine_core::ModelDescriptor, VariableVector), Status> {
    if descriptor_ptr.is_null() || vars_ptr.is_null() {
        return Err(Status::BadInput);
    }
    if n_vars > MAX_VARS {
        return Err(Status::BadInput);
    }
    let bytes = slice::from_raw_parts(descriptor_ptr, descriptor_len);
    let descriptor = engine_wire::codec::decode(bytes).map_err(|_| Status::BadInput)?;
    if descriptor.validate().is_err() {
        return Err(Status::BadInput);
    }
    if descriptor.n_vars as usize != n_vars {
        return Err(Status::BadInput);
    }
    let vars = slice::from_raw_parts(vars_ptr, n_vars).to_vec();
    Ok((descriptor, vars))
}

fn status_for_solve(status: SolveStatus) -> Status {
    match status {
        SolveStatus::Optimal => Status::Ok,
        SolveStatus::Infeasible => Status::Infeasible,
        SolveStatus::SolverError => Status::Error,
        SolveStatus::BadInput => Status::BadInput,
    }
}

/// Runs one LP solve (§4.2) and writes the result into `*out_record`.
///
/// # Safety
///
/// - `descriptor_ptr` must point to `descriptor_len` readable bytes.
/// - `vars_ptr` must point to `n_vars` readable, well-aligned `f64`s.
/// - `out_record` must point to a valid, writable [`SolveRecord`]; it is
///   always written (zero-filled on any non-ok status) before return.
#[no_mangle]
pub unsafe extern "C" fn solve(
    descriptor_ptr: *const u8,
    descriptor_len: usize,
    vars_ptr: *const f64,
    n_vars: usize,
    out_record: *mut SolveRecord,
) -> u8 {
    if out_record.is_null() {
        return Status::BadInput as u8;
    }
    *out_record = SolveRecord::default();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let (descriptor, vars) = unsafe { read_descriptor_and_vars(descriptor_ptr, descriptor_len, vars_ptr, n_vars) }?;
        engine_lp::solve(&descriptor, &vars).map_err(|_| Status::Error)
    }));

    match outcome {
        Ok(Ok(result)) => {
            (*out_record).fill(&result);
            status_for_solve(result.status) as u8
        }
        Ok(Err(status)) => status as u8,
        Err(_) => Status::Error as u8,
    }
}

/// Runs one Monte Carlo batch (§4.4) and writes the result into
/// `*out_record`. Signal classification is not exposed across this
/// boundary — callers read `p5`/`p25`/`p50` and classify locally against
/// their own product-group thresholds.
///
/// # Safety
///
/// Same pointer contract as [`solve`], plus `center_ptr` taking the
/// place of `vars_ptr`.
#[no_mangle]
pub unsafe extern "C" fn monte_carlo(
    descriptor_ptr: *const u8,
    descriptor_len: usize,
    center_ptr: *const f64,
    n_vars: usize,
    n_scenarios: u32,
    out_record: *mut MonteCarloRecord,
) -> u8 {
    if out_record.is_null() {
        return Status::BadInput as u8;
    }
    *out_record = MonteCarloRecord::default();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let (descriptor, center) = unsafe { read_descriptor_and_vars(descriptor_ptr, descriptor_len, center_ptr, n_vars) }?;
        let thresholds = engine_core::SignalThresholds { strong_go: 0.0, go: 0.0, weak: 0.0 };
        engine_lp::run_monte_carlo(&descriptor, &center, n_scenarios, &thresholds).map_err(|_| Status::Error)
    }));

    match outcome {
        Ok(Ok(result)) => {
            (*out_record).fill(n_scenarios.min(engine_lp::MAX_SCENARIOS), &result);
            Status::Ok as u8
        }
        Ok(Err(status)) => status as u8,
        Err(_) => Status::Error as u8,
    }
}

/// Null-terminated, `'static` crate version string (e.g. `"0.1.0"`).
/// Never returns null; the caller must not free the pointer.
#[no_mangle]
pub extern "C" fn version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
}
