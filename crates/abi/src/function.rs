use std::collections::HashMap;
use std::sync::Arc;

use crc::Crc;
use tvm_cells::{Cell, CellBuilder};

use crate::clock::Clock;
use crate::de::{deserialize_params, load_uint_chained};
use crate::error::{AbiError, AbiResult, CellResultExt};
use crate::param::Param;
use crate::ser::{check_type, pack_into_chain, serialize_value};
use crate::signer::{KeyPair, SIGNATURE_LENGTH};
use crate::value::Value;

/// ABI version encoded into every function signature.
pub const ABI_VERSION: u8 = 2;

const CRC_32: Crc<u32> = Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

/// Typed description of a contract entry point.
///
/// When not supplied explicitly, the selectors are derived from the
/// canonical signature: `input_id` is the CRC32 with the top bit
/// cleared, `output_id` the same CRC32 with the top bit set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    name: String,
    header: Vec<Param>,
    inputs: Vec<Param>,
    outputs: Vec<Param>,
    input_id: u32,
    output_id: u32,
}

/// One-shot function invocation, consumed by
/// [`Function::encode_call()`].
#[derive(Debug, Clone, Default)]
pub struct FunctionCall {
    pub header: HashMap<String, Value>,
    pub inputs: Vec<Value>,
    pub internal: bool,
    pub keypair: Option<KeyPair>,
    pub body_as_ref: bool,
}

impl Function {
    pub fn new(
        name: impl Into<String>,
        header: Vec<Param>,
        inputs: Vec<Param>,
        outputs: Vec<Param>,
    ) -> Self {
        let mut function = Self {
            name: name.into(),
            header,
            inputs,
            outputs,
            input_id: 0,
            output_id: 0,
        };
        let id = CRC_32.checksum(function.signature().as_bytes());
        function.input_id = id & 0x7FFF_FFFF;
        function.output_id = id | 0x8000_0000;
        function
    }

    /// Same as [`Function::new()`], with externally supplied selectors.
    pub fn with_ids(
        name: impl Into<String>,
        header: Vec<Param>,
        inputs: Vec<Param>,
        outputs: Vec<Param>,
        input_id: u32,
        output_id: u32,
    ) -> Self {
        Self {
            name: name.into(),
            header,
            inputs,
            outputs,
            input_id,
            output_id,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn header(&self) -> &[Param] {
        &self.header
    }

    #[inline]
    pub fn inputs(&self) -> &[Param] {
        &self.inputs
    }

    #[inline]
    pub fn outputs(&self) -> &[Param] {
        &self.outputs
    }

    #[inline]
    pub fn input_id(&self) -> u32 {
        self.input_id
    }

    #[inline]
    pub fn output_id(&self) -> u32 {
        self.output_id
    }

    /// Canonical signature:
    /// `name(input,..)(output,..)v<version>`.
    ///
    /// Two functions with equal signatures derive equal selectors.
    pub fn signature(&self) -> String {
        let join = |params: &[Param]| {
            params
                .iter()
                .map(|param| param.kind.type_signature())
                .collect::<Vec<_>>()
                .join(",")
        };
        format!(
            "{}({})({})v{}",
            self.name,
            join(&self.inputs),
            join(&self.outputs),
            ABI_VERSION
        )
    }

    /// Encode a call body: signature slot and header (external calls
    /// only), input selector, then the input values, all packed into a
    /// single chain. With a keypair, the representation hash of the
    /// packed body (signature slot zeroed) is signed and the signature
    /// spliced into the slot.
    pub fn encode_input(
        &self,
        clock: &dyn Clock,
        header: &HashMap<String, Value>,
        inputs: &[Value],
        internal: bool,
        keypair: Option<&KeyPair>,
    ) -> AbiResult<Cell> {
        let (body, hash) =
            self.create_unsigned_call(clock, header, inputs, internal, keypair.is_some())?;
        match keypair {
            Some(keypair) if !internal => {
                let signature = keypair.sign(hash)?;
                Self::fill_signature(Some(&signature), &body)
            }
            _ => Ok(body),
        }
    }

    /// Encode a [`FunctionCall`], consuming it.
    pub fn encode_call(&self, call: FunctionCall, clock: &dyn Clock) -> AbiResult<Cell> {
        let FunctionCall {
            header,
            inputs,
            internal,
            keypair,
            body_as_ref,
        } = call;
        let body = self.encode_input(clock, &header, &inputs, internal, keypair.as_ref())?;
        if !body_as_ref {
            return Ok(body);
        }
        let mut wrapper = CellBuilder::new();
        wrapper.store_reference(Arc::new(body)).stored()?;
        Ok(wrapper.into_cell())
    }

    /// Encode an unsigned call body and return it together with the
    /// representation hash to be signed externally.
    ///
    /// With `reserve_sign`, the body starts with a `1` bit and 512
    /// zeroed signature bits for [`Function::fill_signature()`] to
    /// splice into; otherwise a single `0` bit marks the missing
    /// signature. Internal calls carry no slot and no header.
    pub fn create_unsigned_call(
        &self,
        clock: &dyn Clock,
        header: &HashMap<String, Value>,
        inputs: &[Value],
        internal: bool,
        reserve_sign: bool,
    ) -> AbiResult<(Cell, [u8; 32])> {
        let mut leaves = self.header_leaves(clock, header, internal, reserve_sign)?;
        leaves.extend(self.body_leaves(inputs)?);
        let body = pack_into_chain(leaves)?;
        let hash = body.hash();
        Ok((body, hash))
    }

    /// Rewrite the leading signature slot of `body` to carry
    /// `signature` (or its absence), leaving the rest of its bits and
    /// references intact. The input cell is not mutated.
    pub fn fill_signature(signature: Option<&[u8; SIGNATURE_LENGTH]>, body: &Cell) -> AbiResult<Cell> {
        let cell = Arc::new(body.clone());
        let mut slice = cell.slice();
        if slice.load_bit().loaded()? {
            slice.skip_bits(SIGNATURE_LENGTH * 8).loaded()?;
        }

        let mut builder = CellBuilder::new();
        match signature {
            Some(signature) => {
                builder.store_bit(true).stored()?;
                builder.store_bytes(signature).stored()?;
            }
            None => {
                builder.store_bit(false).stored()?;
            }
        }
        builder.store_slice(&slice).stored()?;
        Ok(builder.into_cell())
    }

    /// Encode a response body: output selector, then the output values.
    pub fn encode_output(&self, outputs: &[Value]) -> AbiResult<Cell> {
        if outputs.len() != self.outputs.len() {
            return Err(AbiError::TypeMismatch {
                expected: format!("{} output values", self.outputs.len()),
                got: outputs.len().to_string(),
            });
        }
        let mut selector = CellBuilder::new();
        selector.store_uint(self.output_id as u64, 32).stored()?;
        let mut leaves = vec![selector];
        for (param, value) in self.outputs.iter().zip(outputs) {
            check_type(value, &param.kind)?;
            leaves.extend(serialize_value(value)?);
        }
        pack_into_chain(leaves)
    }

    /// Decode a response body into output values.
    pub fn decode_output(&self, body: &Cell) -> AbiResult<Vec<Value>> {
        let cell = Arc::new(body.clone());
        let mut slice = cell.slice();
        let got = load_uint_chained(&mut slice, 32)? as u32;
        if got != self.output_id {
            return Err(AbiError::SelectorMismatch {
                expected: self.output_id,
                got,
            });
        }
        deserialize_params(&mut slice, &self.outputs, true)
    }

    /// Decode a call body back into its header and input values.
    ///
    /// The signature slot of an external body is skipped; header values
    /// are returned keyed by parameter name.
    pub fn decode_params(
        &self,
        body: &Cell,
        internal: bool,
    ) -> AbiResult<(HashMap<String, Value>, Vec<Value>)> {
        let cell = Arc::new(body.clone());
        let mut slice = cell.slice();

        let mut header = HashMap::new();
        if !internal {
            if slice.load_bit().loaded()? {
                slice.skip_bits(SIGNATURE_LENGTH * 8).loaded()?;
            }
            let values = deserialize_params(&mut slice, &self.header, false)?;
            header.extend(
                self.header
                    .iter()
                    .map(|param| param.name.clone())
                    .zip(values),
            );
        }

        let got = load_uint_chained(&mut slice, 32)? as u32;
        if got != self.input_id {
            return Err(AbiError::SelectorMismatch {
                expected: self.input_id,
                got,
            });
        }
        let inputs = deserialize_params(&mut slice, &self.inputs, true)?;
        Ok((header, inputs))
    }

    fn header_leaves(
        &self,
        clock: &dyn Clock,
        header: &HashMap<String, Value>,
        internal: bool,
        reserve_sign: bool,
    ) -> AbiResult<Vec<CellBuilder>> {
        if internal {
            return Ok(Vec::new());
        }
        let mut slot = CellBuilder::new();
        if reserve_sign {
            slot.store_bit(true).stored()?;
            slot.store_repeated_bit(SIGNATURE_LENGTH * 8, false).stored()?;
        } else {
            slot.store_bit(false).stored()?;
        }

        let mut leaves = vec![slot];
        for param in &self.header {
            let value = match header.get(&param.name) {
                Some(value) => {
                    check_type(value, &param.kind)?;
                    value.clone()
                }
                None => param
                    .kind
                    .default_value(clock)
                    .ok_or_else(|| AbiError::MissingHeaderValue(param.name.clone()))?,
            };
            leaves.extend(serialize_value(&value)?);
        }
        Ok(leaves)
    }

    fn body_leaves(&self, inputs: &[Value]) -> AbiResult<Vec<CellBuilder>> {
        if inputs.len() != self.inputs.len() {
            return Err(AbiError::TypeMismatch {
                expected: format!("{} input values", self.inputs.len()),
                got: inputs.len().to_string(),
            });
        }
        let mut selector = CellBuilder::new();
        selector.store_uint(self.input_id as u64, 32).stored()?;
        let mut leaves = vec![selector];
        for (param, value) in self.inputs.iter().zip(inputs) {
            check_type(value, &param.kind)?;
            leaves.extend(serialize_value(value)?);
        }
        Ok(leaves)
    }
}
