//! Fixed-layout instruction payload encoding
//!
//! Programs addressed by this crate read their instruction data as one
//! discriminator byte followed by unsigned little-endian fields in
//! declaration order. The encoder pre-allocates a worst-case buffer,
//! appends fields as they are declared, and reports the exact number of
//! bytes written so trailing capacity can be trimmed.

/// Append-only buffer for fixed-layout little-endian encoding
///
/// Capacity is reserved up front for the worst-case encoding; `written()`
/// reports the exact encoded length afterwards. Appending can never
/// overrun: the buffer grows with each field, so a field value always
/// occupies exactly its declared width.
#[derive(Debug, Clone)]
pub struct LayoutBuffer {
    bytes: Vec<u8>,
}

impl LayoutBuffer {
    /// Create a buffer with worst-case capacity reserved
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    /// Append an unsigned 16-bit field, little-endian
    pub fn put_u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    /// Append an unsigned 64-bit field, little-endian
    pub fn put_u64(&mut self, value: u64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    /// Exact number of bytes written so far
    pub fn written(&self) -> usize {
        self.bytes.len()
    }

    /// Consume the buffer into instruction data: one discriminator byte
    /// followed by the encoded payload, trimmed to the written length
    pub fn into_instruction_data(self, discriminator: u8) -> Vec<u8> {
        let mut data = Vec::with_capacity(1 + self.bytes.len());
        data.push(discriminator);
        data.extend_from_slice(&self.bytes);
        data
    }
}

/// Encode a typed payload into final instruction data
pub fn encode_instruction_data<P: FixedLayout>(discriminator: u8, payload: &P) -> Vec<u8> {
    let mut buf = LayoutBuffer::with_capacity(P::ENCODED_LEN);
    payload.encode(&mut buf);
    debug_assert_eq!(buf.written(), P::ENCODED_LEN);
    buf.into_instruction_data(discriminator)
}

/// A payload with a fixed binary layout
///
/// `ENCODED_LEN` is the sum of the declared field widths; `encode` must
/// write the fields in declaration order.
pub trait FixedLayout {
    /// Sum of declared field widths in bytes
    const ENCODED_LEN: usize;

    /// Write all fields, in declaration order, little-endian
    fn encode(&self, buf: &mut LayoutBuffer);
}

/// Discriminator for the program's initialize operation
pub const INITIALIZE_DISCRIMINATOR: u8 = 0;

/// Discriminator for the AMM swap (base in) operation
pub const SWAP_DISCRIMINATOR: u8 = 9;

/// Arguments for the initialize instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitializeArgs {
    /// Pre-swap SOL balance snapshot, in lamports
    pub preswap_sol_balance: u64,

    /// Tip in basis points
    pub tip_bps: u16,
}

impl FixedLayout for InitializeArgs {
    const ENCODED_LEN: usize = 8 + 2;

    fn encode(&self, buf: &mut LayoutBuffer) {
        buf.put_u64(self.preswap_sol_balance);
        buf.put_u16(self.tip_bps);
    }
}

impl InitializeArgs {
    /// Full instruction data for this payload
    pub fn instruction_data(&self) -> Vec<u8> {
        encode_instruction_data(INITIALIZE_DISCRIMINATOR, self)
    }
}

/// Arguments for the AMM swap instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapArgs {
    /// Amount of the source token to swap in, in base units
    pub amount_in: u64,

    /// Minimum acceptable amount of the destination token
    pub minimum_amount_out: u64,
}

impl FixedLayout for SwapArgs {
    const ENCODED_LEN: usize = 8 + 8;

    fn encode(&self, buf: &mut LayoutBuffer) {
        buf.put_u64(self.amount_in);
        buf.put_u64(self.minimum_amount_out);
    }
}

impl SwapArgs {
    /// Full instruction data for this payload
    pub fn instruction_data(&self) -> Vec<u8> {
        encode_instruction_data(SWAP_DISCRIMINATOR, self)
    }
}
