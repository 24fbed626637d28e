//! Binary Model Descriptor codec (§4.1).
//!
//! Fixed, little-endian, field-by-field layout — no general serialization
//! framework, since the wire format is a contract other (non-Rust) solver
//! processes must also implement byte-for-byte.
//!
//! ```text
//! header:
//!   n_vars            u16
//!   n_routes          u8
//!   n_constraints     u8
//!   objective_mode    u8
//!   risk_aversion     f64
//!   profit_floor      f64
//! routes[n_routes]:
//!   id, origin, destination   str8 (u8 len + utf8 bytes)
//!   mode                      u8
//!   sell_idx, buy_idx, freight_idx   u8
//!   base_transit_days         f64
//!   transit_cost_per_day      f64
//!   unit_capacity             f64
//! constraints[n_constraints]:
//!   id                        str8
//!   kind                      u8
//!   bound_idx                 u8
//!   bound_min_idx             u8   (0xFF = absent)
//!   outage_idx                u8   (0xFF = absent)
//!   outage_factor             f64
//!   n_route_indices           u8
//!   route_indices             [u8; n_route_indices]
//!   has_custom_coefficients   u8   (0 or 1)
//!   custom_coefficients       [f64; n_route_indices]   (only if has = 1)
//! perturbations[n_vars]:
//!   sigma, lo, hi             f64 each
//!   n_correlations            u8
//!   correlations              [(var_idx: u8, coefficient: f64); n_correlations]
//! ```

use engine_core::{
    ConstraintKind, CorrelationLink, ModelDescriptor, ObjectiveMode, PerturbationSpec, Route,
    TransportMode, ABSENT_INDEX, MAX_CONSTRAINTS, MAX_CORRELATIONS, MAX_ROUTES, MAX_VARS,
};

use crate::error::{WireError, WireResult};

/// Encode a descriptor into its canonical byte layout.
///
/// Callers should run [`engine_core::ModelDescriptor::validate`] first;
/// this function does not re-validate index ranges, only count maxima
/// that would otherwise overflow the `u8` length fields.
pub fn encode(descriptor: &ModelDescriptor) -> WireResult<Vec<u8>> {
    check_max("n_vars", descriptor.n_vars as usize, MAX_VARS)?;
    check_max("routes", descriptor.routes.len(), MAX_ROUTES)?;
    check_max("constraints", descriptor.constraints.len(), MAX_CONSTRAINTS)?;

    let mut buf = Vec::new();
    buf.extend_from_slice(&descriptor.n_vars.to_le_bytes());
    buf.push(descriptor.routes.len() as u8);
    buf.push(descriptor.constraints.len() as u8);
    buf.push(descriptor.objective_mode.to_wire());
    buf.extend_from_slice(&descriptor.risk_aversion.to_le_bytes());
    buf.extend_from_slice(&descriptor.profit_floor.to_le_bytes());

    for route in &descriptor.routes {
        write_str8(&mut buf, &route.id)?;
        write_str8(&mut buf, &route.origin)?;
        write_str8(&mut buf, &route.destination)?;
        buf.push(transport_mode_to_wire(route.mode));
        buf.push(route.sell_idx);
        buf.push(route.buy_idx);
        buf.push(route.freight_idx);
        buf.extend_from_slice(&route.base_transit_days.to_le_bytes());
        buf.extend_from_slice(&route.transit_cost_per_day.to_le_bytes());
        buf.extend_from_slice(&route.unit_capacity.to_le_bytes());
    }

    for constraint in &descriptor.constraints {
        write_str8(&mut buf, &constraint.id)?;
        buf.push(constraint_kind_to_wire(constraint.kind));
        buf.push(constraint.bound_idx);
        buf.push(constraint.bound_min_idx.unwrap_or(ABSENT_INDEX));
        buf.push(constraint.outage_idx.unwrap_or(ABSENT_INDEX));
        buf.extend_from_slice(&constraint.outage_factor.to_le_bytes());
        check_max(
            "route_indices",
            constraint.route_indices.len(),
            MAX_ROUTES,
        )?;
        buf.push(constraint.route_indices.len() as u8);
        buf.extend_from_slice(&constraint.route_indices);
        match &constraint.custom_coefficients {
            Some(coeffs) => {
                buf.push(1);
                for c in coeffs {
                    buf.extend_from_slice(&c.to_le_bytes());
                }
            }
            None => buf.push(0),
        }
    }

    for spec in &descriptor.perturbations {
        buf.extend_from_slice(&spec.sigma.to_le_bytes());
        buf.extend_from_slice(&spec.lo.to_le_bytes());
        buf.extend_from_slice(&spec.hi.to_le_bytes());
        check_max(
            "correlations",
            spec.correlations.len(),
            MAX_CORRELATIONS,
        )?;
        buf.push(spec.correlations.len() as u8);
        for link in &spec.correlations {
            buf.push(link.var_idx);
            buf.extend_from_slice(&link.coefficient.to_le_bytes());
        }
    }

    Ok(buf)
}

/// Decode a descriptor from its canonical byte layout, validating
/// structural invariants as a final step.
pub fn decode(bytes: &[u8]) -> WireResult<ModelDescriptor> {
    let mut cur = Cursor::new(bytes);
    decode_from_cursor(&mut cur)
}

/// Decode a descriptor from the front of `bytes`, also returning how many
/// bytes it consumed. Used by [`crate::port`] (§6.2), whose request
/// frames carry a descriptor followed immediately by a variable vector
/// with no length prefix of its own — the caller needs to know where the
/// descriptor ends to find the vector.
pub(crate) fn decode_prefix(bytes: &[u8]) -> WireResult<(ModelDescriptor, usize)> {
    let mut cur = Cursor::new(bytes);
    let descriptor = decode_from_cursor(&mut cur)?;
    Ok((descriptor, cur.pos))
}

fn decode_from_cursor(cur: &mut Cursor) -> WireResult<ModelDescriptor> {
    let n_vars = cur.read_u16()?;
    let n_routes = cur.read_u8()? as usize;
    let n_constraints = cur.read_u8()? as usize;
    let objective_mode = ObjectiveMode::from_wire(cur.read_u8()?).ok_or_else(|| {
        WireError::UnknownTag {
            field: "objective_mode",
            tag: 0xFF,
        }
    })?;
    let risk_aversion = cur.read_f64()?;
    let profit_floor = cur.read_f64()?;

    let mut routes = Vec::with_capacity(n_routes);
    for _ in 0..n_routes {
        let id = cur.read_str8()?;
        let origin = cur.read_str8()?;
        let destination = cur.read_str8()?;
        let mode = transport_mode_from_wire(cur.read_u8()?)?;
        let sell_idx = cur.read_u8()?;
        let buy_idx = cur.read_u8()?;
        let freight_idx = cur.read_u8()?;
        let base_transit_days = cur.read_f64()?;
        let transit_cost_per_day = cur.read_f64()?;
        let unit_capacity = cur.read_f64()?;
        routes.push(Route {
            id,
            origin,
            destination,
            mode,
            sell_idx,
            buy_idx,
            freight_idx,
            base_transit_days,
            transit_cost_per_day,
            unit_capacity,
        });
    }

    let mut constraints = Vec::with_capacity(n_constraints);
    for _ in 0..n_constraints {
        let id = cur.read_str8()?;
        let kind = constraint_kind_from_wire(cur.read_u8()?)?;
        let bound_idx = cur.read_u8()?;
        let bound_min_idx = index_or_absent(cur.read_u8()?);
        let outage_idx = index_or_absent(cur.read_u8()?);
        let outage_factor = cur.read_f64()?;
        let n_route_indices = cur.read_u8()? as usize;
        let route_indices = cur.read_bytes(n_route_indices)?.to_vec();
        let has_custom = cur.read_u8()?;
        let custom_coefficients = if has_custom == 1 {
            let mut coeffs = Vec::with_capacity(n_route_indices);
            for _ in 0..n_route_indices {
                coeffs.push(cur.read_f64()?);
            }
            Some(coeffs)
        } else {
            None
        };
        constraints.push(engine_core::Constraint {
            id,
            kind,
            bound_idx,
            bound_min_idx,
            outage_idx,
            outage_factor,
            route_indices,
            custom_coefficients,
        });
    }

    let mut perturbations = Vec::with_capacity(n_vars as usize);
    for _ in 0..n_vars {
        let sigma = cur.read_f64()?;
        let lo = cur.read_f64()?;
        let hi = cur.read_f64()?;
        let n_corr = cur.read_u8()? as usize;
        let mut correlations = Vec::with_capacity(n_corr);
        for _ in 0..n_corr {
            let var_idx = cur.read_u8()?;
            let coefficient = cur.read_f64()?;
            correlations.push(CorrelationLink {
                var_idx,
                coefficient,
            });
        }
        perturbations.push(PerturbationSpec {
            sigma,
            lo,
            hi,
            correlations,
        });
    }

    let descriptor = ModelDescriptor {
        n_vars,
        routes,
        constraints,
        objective_mode,
        risk_aversion,
        profit_floor,
        perturbations,
    };
    descriptor.validate().map_err(|e| WireError::Invalid(e.to_string()))?;
    Ok(descriptor)
}

fn check_max(field: &'static str, value: usize, max: usize) -> WireResult<()> {
    if value > max {
        return Err(WireError::CountExceeded { field, value, max });
    }
    Ok(())
}

fn write_str8(buf: &mut Vec<u8>, s: &str) -> WireResult<()> {
    let bytes = s.as_bytes();
    if bytes.len() > u8::MAX as usize {
        return Err(WireError::CountExceeded {
            field: "string",
            value: bytes.len(),
            max: u8::MAX as usize,
        });
    }
    buf.push(bytes.len() as u8);
    buf.extend_from_slice(bytes);
    Ok(())
}

fn index_or_absent(byte: u8) -> Option<u8> {
    if byte == ABSENT_INDEX {
        None
    } else {
        Some(byte)
    }
}

fn transport_mode_to_wire(mode: TransportMode) -> u8 {
    match mode {
        TransportMode::Barge => 0,
        TransportMode::Rail => 1,
        TransportMode::Truck => 2,
        TransportMode::Vessel => 3,
        TransportMode::Pipeline => 4,
    }
}

fn transport_mode_from_wire(tag: u8) -> WireResult<TransportMode> {
    match tag {
        0 => Ok(TransportMode::Barge),
        1 => Ok(TransportMode::Rail),
        2 => Ok(TransportMode::Truck),
        3 => Ok(TransportMode::Vessel),
        4 => Ok(TransportMode::Pipeline),
        tag => Err(WireError::UnknownTag {
            field: "route.mode",
            tag,
        }),
    }
}

fn constraint_kind_to_wire(kind: ConstraintKind) -> u8 {
    match kind {
        ConstraintKind::Supply => 0,
        ConstraintKind::Demand => 1,
        ConstraintKind::Fleet => 2,
        ConstraintKind::Capital => 3,
        ConstraintKind::Custom => 4,
    }
}

fn constraint_kind_from_wire(tag: u8) -> WireResult<ConstraintKind> {
    match tag {
        0 => Ok(ConstraintKind::Supply),
        1 => Ok(ConstraintKind::Demand),
        2 => Ok(ConstraintKind::Fleet),
        3 => Ok(ConstraintKind::Capital),
        4 => Ok(ConstraintKind::Custom),
        tag => Err(WireError::UnknownTag {
            field: "constraint.kind",
            tag,
        }),
    }
}

/// Minimal forward-only byte cursor for the fixed wire layout above.
/// `pub(crate)` so [`crate::port`] can reuse the same bounds-checked
/// reads for the fields (command byte, scenario count, variable vector)
/// that sit alongside a descriptor in a Port frame (§6.2).
pub(crate) struct Cursor<'a> {
    bytes: &'a [u8],
    pub(crate) pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub(crate) fn read_bytes(&mut self, n: usize) -> WireResult<&'a [u8]> {
        if self.pos + n > self.bytes.len() {
            return Err(WireError::Truncated {
                needed: n,
                available: self.bytes.len() - self.pos,
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub(crate) fn read_u8(&mut self) -> WireResult<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub(crate) fn read_u16(&mut self) -> WireResult<u16> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub(crate) fn read_u32(&mut self) -> WireResult<u32> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_le_bytes(b.try_into().unwrap()))
    }

    pub(crate) fn read_f64(&mut self) -> WireResult<f64> {
        let b = self.read_bytes(8)?;
        Ok(f64::from_le_bytes(b.try_into().unwrap()))
    }

    fn read_str8(&mut self) -> WireResult<String> {
        let len = self.read_u8()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| WireError::Invalid("non-utf8 string in descriptor".into()))
    }
}
