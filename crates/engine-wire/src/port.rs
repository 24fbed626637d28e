//! Length-prefixed Port protocol (§6.2).
//!
//! Frames exchanged with the out-of-process solver are `u32` big-endian
//! length prefix followed by that many payload bytes — the same framing
//! idiom as the old Arrow IPC subprocess channel, minus Arrow. On top of
//! that framing, this module implements the command dispatch and the
//! request/response record layouts §6.2 specifies:
//!
//! - A request frame's payload starts with a one-byte [`Command`]
//!   followed by [`Command::Solve`]'s descriptor + variable vector or
//!   [`Command::MonteCarlo`]'s scenario count + descriptor + center
//!   vector.
//! - A response frame's payload starts with a one-byte [`ResponseStatus`]
//!   followed by the fixed-shape solve or Monte Carlo result record,
//!   mirroring the `engine-ffi` `SolveRecord`/`MonteCarloRecord` fill for
//!   the embedded boundary (§6.3) — same fields, same order, framed
//!   instead of fixed-capacity.
//!
//! The descriptor and vector fields inside a frame follow §4.1's
//! little-endian convention throughout, including `n_scenarios`; only the
//! outer frame length prefix is big-endian, per §6.2's literal header.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use engine_core::{ModelDescriptor, MonteCarloResult, SolveResult, SolveStatus, VariableVector};

use crate::codec::{self, Cursor};
use crate::error::{WireError, WireResult};

/// Maximum accepted frame payload size: guards against a misbehaving
/// peer sending a length prefix that would exhaust memory before the
/// rest of the frame even arrives.
pub const MAX_FRAME_BYTES: u32 = 64 * 1024 * 1024;

/// Write one length-prefixed frame and flush.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> WireResult<()> {
    let len = u32::try_from(payload.len()).map_err(|_| WireError::CountExceeded {
        field: "frame payload",
        value: payload.len(),
        max: u32::MAX as usize,
    })?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame. Returns `Ok(None)` on a clean EOF
/// before any bytes of the next frame's length prefix arrive (the only
/// EOF that isn't an error: the peer closed the channel between frames).
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> WireResult<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match read_exact_or_eof(reader, &mut len_buf).await? {
        false => return Ok(None),
        true => {}
    }
    let declared = u32::from_be_bytes(len_buf);
    if declared > MAX_FRAME_BYTES {
        return Err(WireError::CountExceeded {
            field: "frame length",
            value: declared as usize,
            max: MAX_FRAME_BYTES as usize,
        });
    }
    let mut payload = vec![0u8; declared as usize];
    reader.read_exact(&mut payload).await?;
    if payload.len() != declared as usize {
        return Err(WireError::LengthMismatch {
            declared,
            actual: payload.len(),
        });
    }
    Ok(Some(payload))
}

/// Like `read_exact`, but returns `Ok(false)` instead of erroring when
/// zero bytes are read before EOF (a clean shutdown between frames).
async fn read_exact_or_eof<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> WireResult<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(WireError::Truncated {
                needed: buf.len(),
                available: filled,
            });
        }
        filled += n;
    }
    Ok(true)
}

/// Request frame command tag (§6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Solve = 1,
    MonteCarlo = 2,
}

impl Command {
    pub fn from_byte(byte: u8) -> WireResult<Self> {
        match byte {
            1 => Ok(Command::Solve),
            2 => Ok(Command::MonteCarlo),
            other => Err(WireError::UnknownTag { field: "command", tag: other }),
        }
    }
}

/// A decoded request frame, one variant per [`Command`] (§6.2).
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Solve { descriptor: ModelDescriptor, vars: VariableVector },
    MonteCarlo { descriptor: ModelDescriptor, center: VariableVector, n_scenarios: u32 },
}

/// Encode a Command 1 request: `descriptor | vars[n_vars]`, command byte
/// prepended.
pub fn encode_solve_request(descriptor: &ModelDescriptor, vars: &[f64]) -> WireResult<Vec<u8>> {
    let mut buf = vec![Command::Solve as u8];
    buf.extend_from_slice(&codec::encode(descriptor)?);
    for v in vars {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    Ok(buf)
}

/// Encode a Command 2 request: `n_scenarios:u32 | descriptor | center[n_vars]`,
/// command byte prepended.
pub fn encode_monte_carlo_request(descriptor: &ModelDescriptor, center: &[f64], n_scenarios: u32) -> WireResult<Vec<u8>> {
    let mut buf = vec![Command::MonteCarlo as u8];
    buf.extend_from_slice(&n_scenarios.to_le_bytes());
    buf.extend_from_slice(&codec::encode(descriptor)?);
    for v in center {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    Ok(buf)
}

/// Decode one request frame's payload (command byte included) into a
/// [`Request`] (§6.2).
pub fn decode_request(payload: &[u8]) -> WireResult<Request> {
    if payload.is_empty() {
        return Err(WireError::Truncated { needed: 1, available: 0 });
    }
    match Command::from_byte(payload[0])? {
        Command::Solve => {
            let rest = &payload[1..];
            let (descriptor, consumed) = codec::decode_prefix(rest)?;
            let vars = read_vars(&rest[consumed..], descriptor.n_vars as usize)?;
            Ok(Request::Solve { descriptor, vars })
        }
        Command::MonteCarlo => {
            let mut cur = Cursor::new(&payload[1..]);
            let n_scenarios = cur.read_u32()?;
            let rest = &payload[1..];
            let descriptor_bytes = &rest[cur.pos..];
            let (descriptor, consumed) = codec::decode_prefix(descriptor_bytes)?;
            let center = read_vars(&descriptor_bytes[consumed..], descriptor.n_vars as usize)?;
            Ok(Request::MonteCarlo { descriptor, center, n_scenarios })
        }
    }
}

fn read_vars(bytes: &[u8], n_vars: usize) -> WireResult<VariableVector> {
    let needed = n_vars * 8;
    if bytes.len() < needed {
        return Err(WireError::Truncated { needed, available: bytes.len() });
    }
    let mut out = Vec::with_capacity(n_vars);
    for i in 0..n_vars {
        let chunk: [u8; 8] = bytes[i * 8..i * 8 + 8].try_into().unwrap();
        out.push(f64::from_le_bytes(chunk));
    }
    Ok(out)
}

/// Response frame status byte — the same small vocabulary the `engine-ffi`
/// boundary reports (§6.3), reused here since both surfaces report the
/// same underlying solver outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseStatus {
    Ok = 0,
    Infeasible = 1,
    Error = 2,
    BadInput = 3,
}

impl ResponseStatus {
    pub fn from_byte(byte: u8) -> WireResult<Self> {
        match byte {
            0 => Ok(ResponseStatus::Ok),
            1 => Ok(ResponseStatus::Infeasible),
            2 => Ok(ResponseStatus::Error),
            3 => Ok(ResponseStatus::BadInput),
            other => Err(WireError::UnknownTag { field: "response status", tag: other }),
        }
    }
}

impl From<SolveStatus> for ResponseStatus {
    fn from(status: SolveStatus) -> Self {
        match status {
            SolveStatus::Optimal => ResponseStatus::Ok,
            SolveStatus::Infeasible => ResponseStatus::Infeasible,
            SolveStatus::SolverError => ResponseStatus::Error,
            SolveStatus::BadInput => ResponseStatus::BadInput,
        }
    }
}

/// Encode a Command 1 response: `status:u8, n_routes:u8, n_constraints:u8,
/// profit/tons/cost/roi:f64, route_tons/route_profits/margins[n_routes],
/// shadow_prices[n_constraints]` (§6.2).
pub fn encode_solve_response(result: &SolveResult) -> Vec<u8> {
    let n_routes = result.route_tons.len().min(u8::MAX as usize);
    let n_constraints = result.shadow_prices.len().min(u8::MAX as usize);

    let mut buf = Vec::new();
    buf.push(ResponseStatus::from(result.status) as u8);
    buf.push(n_routes as u8);
    buf.push(n_constraints as u8);
    buf.extend_from_slice(&result.profit.to_le_bytes());
    buf.extend_from_slice(&result.tons.to_le_bytes());
    buf.extend_from_slice(&result.cost.to_le_bytes());
    buf.extend_from_slice(&result.roi.to_le_bytes());
    write_f64_slice(&mut buf, &result.route_tons[..n_routes]);
    write_f64_slice(&mut buf, &result.route_profits[..n_routes]);
    write_f64_slice(&mut buf, &result.margins[..n_routes]);
    write_f64_slice(&mut buf, &result.shadow_prices[..n_constraints]);
    buf
}

/// Decode a Command 1 response.
pub fn decode_solve_response(bytes: &[u8]) -> WireResult<(ResponseStatus, SolveResult)> {
    let mut cur = Cursor::new(bytes);
    let status = ResponseStatus::from_byte(cur.read_u8()?)?;
    let n_routes = cur.read_u8()? as usize;
    let n_constraints = cur.read_u8()? as usize;
    let profit = cur.read_f64()?;
    let tons = cur.read_f64()?;
    let cost = cur.read_f64()?;
    let roi = cur.read_f64()?;
    let route_tons = read_f64_vec(&mut cur, n_routes)?;
    let route_profits = read_f64_vec(&mut cur, n_routes)?;
    let margins = read_f64_vec(&mut cur, n_routes)?;
    let shadow_prices = read_f64_vec(&mut cur, n_constraints)?;

    let solve_status = match status {
        ResponseStatus::Ok => SolveStatus::Optimal,
        ResponseStatus::Infeasible => SolveStatus::Infeasible,
        ResponseStatus::Error => SolveStatus::SolverError,
        ResponseStatus::BadInput => SolveStatus::BadInput,
    };
    let result = SolveResult {
        status: solve_status,
        profit,
        tons,
        cost,
        roi,
        route_tons,
        route_profits,
        margins,
        shadow_prices,
    };
    Ok((status, result))
}

/// Encode a Command 2 response: `status:u8, n_vars:u16, n_scenarios:u32,
/// n_feasible:u32, n_infeasible:u32, mean/stddev/p5/p25/p50/p75/p95/min/max:f64,
/// sensitivity[n_vars]` (§6.2). Status is always `Ok`: a Monte Carlo run
/// always produces a distribution (possibly zero-filled, §8), never a
/// per-run infeasible/bad-input outcome the way a single solve can.
pub fn encode_monte_carlo_response(n_scenarios: u32, result: &MonteCarloResult) -> Vec<u8> {
    let n_vars = result.sensitivity.len().min(u16::MAX as usize);

    let mut buf = Vec::new();
    buf.push(ResponseStatus::Ok as u8);
    buf.extend_from_slice(&(n_vars as u16).to_le_bytes());
    buf.extend_from_slice(&n_scenarios.to_le_bytes());
    buf.extend_from_slice(&result.feasible_count.to_le_bytes());
    buf.extend_from_slice(&result.infeasible_count.to_le_bytes());
    buf.extend_from_slice(&result.mean.to_le_bytes());
    buf.extend_from_slice(&result.stddev.to_le_bytes());
    buf.extend_from_slice(&result.p5.to_le_bytes());
    buf.extend_from_slice(&result.p25.to_le_bytes());
    buf.extend_from_slice(&result.p50.to_le_bytes());
    buf.extend_from_slice(&result.p75.to_le_bytes());
    buf.extend_from_slice(&result.p95.to_le_bytes());
    buf.extend_from_slice(&result.min.to_le_bytes());
    buf.extend_from_slice(&result.max.to_le_bytes());
    write_f64_slice(&mut buf, &result.sensitivity[..n_vars]);
    buf
}

/// Decode a Command 2 response. The embedded `signal` classification is
/// not part of the wire record (§6.2 lists no such field); callers
/// classify locally from `p5`/`p25`/`p50` against their own product-group
/// thresholds, as `engine-ffi::monte_carlo` already documents.
pub fn decode_monte_carlo_response(bytes: &[u8]) -> WireResult<(ResponseStatus, u32, MonteCarloResult)> {
    let mut cur = Cursor::new(bytes);
    let status = ResponseStatus::from_byte(cur.read_u8()?)?;
    let n_vars = cur.read_u16()? as usize;
    let n_scenarios = cur.read_u32()?;
    let feasible_count = cur.read_u32()?;
    let infeasible_count = cur.read_u32()?;
    let mean = cur.read_f64()?;
    let stddev = cur.read_f64()?;
    let p5 = cur.read_f64()?;
    let p25 = cur.read_f64()?;
    let p50 = cur.read_f64()?;
    let p75 = cur.read_f64()?;
    let p95 = cur.read_f64()?;
    let min = cur.read_f64()?;
    let max = cur.read_f64()?;
    let sensitivity = read_f64_vec(&mut cur, n_vars)?;

    // The wire record carries no signal; the caller classifies from the
    // quantiles against its own thresholds, so this placeholder is never
    // read as ground truth.
    let result = MonteCarloResult {
        feasible_count,
        infeasible_count,
        mean,
        stddev,
        p5,
        p25,
        p50,
        p75,
        p95,
        min,
        max,
        sensitivity,
        signal: engine_core::Signal::NoGo,
    };
    Ok((status, n_scenarios, result))
}

fn write_f64_slice(buf: &mut Vec<u8>, values: &[f64]) {
    for v in values {
        buf.extend_from_slice(&v.to_le_bytes());
    }
}

fn read_f64_vec(cur: &mut Cursor, n: usize) -> WireResult<Vec<f64>> {
    (0..n).map(|_| cur.read_f64()).collect()
}
