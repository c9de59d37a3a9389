//! Stripe packing for multi-file groups.
//!
//! A group bundling several child files stores them interleaved: the
//! decoded container payload is a sequence of stripes, each holding one
//! segment per child, followed by a length table and a single trailing
//! stripe-count byte:
//!
//! ```text
//! [stripe 0: child 0 seg][stripe 0: child 1 seg]...[stripe S-1: child N-1 seg]
//! [length table: S * N * i32 BE, stripe-major, delta-encoded per stripe]
//! [stripe count: u8]
//! ```
//!
//! Table values are deltas: within a stripe, each value is the difference
//! from the previous child's segment length, and the running sum is the
//! segment length itself (the accumulator resets at each stripe). There
//! are no boundary markers in the data region - only the table describes
//! the split.
//!
//! A group with exactly one child skips all of this; its payload is the
//! child's bytes verbatim.

use thiserror::Error;

/// Stripe layout error type
#[derive(Debug, Error)]
pub enum GroupError {
    /// Payload too small to hold the stripe footer
    #[error("group payload has no stripe footer")]
    MissingFooter,

    /// Length table does not fit in the payload
    #[error("stripe table needs {needed} bytes, payload holds {available}")]
    TableOutOfBounds {
        /// Bytes the table and footer require
        needed: usize,
        /// Bytes available in the payload
        available: usize,
    },

    /// A delta run produced a negative segment length
    #[error("negative segment length for child {child} in stripe {stripe}")]
    NegativeSegment {
        /// Stripe index
        stripe: usize,
        /// Child slot index
        child: usize,
    },

    /// Segments overrun the data region
    #[error("stripe segments overrun the data region at byte {at}")]
    SegmentOverrun {
        /// Offset at which the overrun happened
        at: usize,
    },
}

/// Split a decoded group payload into per-child byte buffers.
///
/// `child_count` is the number of child slots the archive manifest
/// declares for the group, in id order; the returned buffers line up
/// with those slots.
pub fn split_children(data: &[u8], child_count: usize) -> Result<Vec<Vec<u8>>, GroupError> {
    if child_count <= 1 {
        return Ok(vec![data.to_vec(); child_count]);
    }

    let Some((&footer, body)) = data.split_last() else {
        return Err(GroupError::MissingFooter);
    };
    let stripe_count = footer as usize;

    let table_len = stripe_count * child_count * 4;
    if table_len > body.len() {
        return Err(GroupError::TableOutOfBounds {
            needed: table_len + 1,
            available: data.len(),
        });
    }
    let data_len = body.len() - table_len;
    let table = &body[data_len..];

    // First pass: expand the delta table into absolute segment lengths
    // and per-child totals.
    let mut segment_lens = vec![0usize; stripe_count * child_count];
    let mut totals = vec![0usize; child_count];
    let mut cursor = 0;
    for stripe in 0..stripe_count {
        let mut running = 0i64;
        for child in 0..child_count {
            let delta = i32::from_be_bytes([
                table[cursor],
                table[cursor + 1],
                table[cursor + 2],
                table[cursor + 3],
            ]);
            cursor += 4;
            running += i64::from(delta);
            if running < 0 {
                return Err(GroupError::NegativeSegment { stripe, child });
            }
            segment_lens[stripe * child_count + child] = running as usize;
            totals[child] += running as usize;
        }
    }

    // Second pass: one shared forward cursor copies each stripe's
    // segments into the owning child's buffer.
    let mut children: Vec<Vec<u8>> = totals
        .iter()
        .map(|&total| Vec::with_capacity(total))
        .collect();
    let mut read = 0usize;
    for stripe in 0..stripe_count {
        for (child, buffer) in children.iter_mut().enumerate() {
            let len = segment_lens[stripe * child_count + child];
            let end = read + len;
            if end > data_len {
                return Err(GroupError::SegmentOverrun { at: end });
            }
            buffer.extend_from_slice(&body[read..end]);
            read = end;
        }
    }

    Ok(children)
}

/// Pack per-child buffers into a striped group payload.
///
/// Each child's bytes are spread evenly across `stripe_count` stripes
/// (trailing stripes absorb the remainder, so segment sizes are uneven
/// whenever the length does not divide). The inverse of
/// [`split_children`] for any `stripe_count >= 1`.
pub fn pack_children(children: &[Vec<u8>], stripe_count: u8) -> Vec<u8> {
    fn segment(child: &[u8], stripe: usize, stripes: usize) -> &[u8] {
        let start = child.len() * stripe / stripes;
        let end = child.len() * (stripe + 1) / stripes;
        &child[start..end]
    }

    let stripes = usize::from(stripe_count);
    let total: usize = children.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(total + stripes * children.len() * 4 + 1);

    for stripe in 0..stripes {
        for child in children {
            out.extend_from_slice(segment(child, stripe, stripes));
        }
    }

    for stripe in 0..stripes {
        let mut previous = 0i64;
        for child in children {
            let len = segment(child, stripe, stripes).len() as i64;
            out.extend_from_slice(&((len - previous) as i32).to_be_bytes());
            previous = len;
        }
    }

    out.push(stripe_count);
    out
}
