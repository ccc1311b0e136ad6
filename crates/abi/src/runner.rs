//! Adapter between typed values and a TVM executor for `get`-methods.
use std::sync::Arc;

use impl_tools::autoimpl;
use num_bigint::{BigInt, BigUint};
use num_traits::{ToPrimitive, Zero};
use tvm_cells::{Cell, CellBuilder, CellSlice, MsgAddress};

use crate::account::{AccountState, AccountStateInfo};
use crate::de::read_byte_chain;
use crate::error::{AbiError, AbiResult, CellResultExt};
use crate::function::Function;
use crate::param::ParamType;
use crate::ser::{build_byte_chain, check_int_range, check_type};
use crate::value::Value;

/// A single VM stack entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackItem {
    Null,
    Int(BigInt),
    Cell(Arc<Cell>),
    Slice(CellSlice),
    Tuple(Vec<StackItem>),
}

/// Everything an executor needs to run one `get`-method.
#[derive(Debug, Clone)]
pub struct VmInvocation {
    pub code: Arc<Cell>,
    pub data: Arc<Cell>,
    pub address: MsgAddress,
    pub balance: u128,
    /// Unix time of the account snapshot, milliseconds
    pub now_ms: u64,
    /// Method selector pushed on top of the stack
    pub selector: u32,
    /// Arguments, bottom to top
    pub stack: Vec<StackItem>,
}

/// Executor verdict: exit code and the result stack, bottom to top.
#[derive(Debug, Clone)]
pub struct VmOutcome {
    pub exit_code: i32,
    pub stack: Vec<StackItem>,
}

/// The VM behind [`run_get_method()`]. Implementations are expected to
/// instantiate a VM over the given code/data cells and run it
/// synchronously.
#[autoimpl(for<E: trait + ?Sized> &mut E, Box<E>)]
pub trait VmExecutor {
    fn run(&mut self, invocation: VmInvocation) -> AbiResult<VmOutcome>;
}

/// Run a `get`-method against an account snapshot and decode its
/// outputs.
///
/// The account must be `active`; inputs are type-checked against the
/// function schema and converted to stack items; the top
/// `outputs.len()` items of the result stack map to the outputs in
/// declaration order.
pub fn run_get_method<E>(
    executor: &mut E,
    account: &AccountStateInfo,
    function: &Function,
    inputs: &[Value],
) -> AbiResult<Vec<Value>>
where
    E: VmExecutor + ?Sized,
{
    if account.state != AccountState::Active {
        return Err(AbiError::AccountInactive);
    }
    let (Some(code), Some(data)) = (account.details.code.clone(), account.details.data.clone())
    else {
        return Err(AbiError::AccountInactive);
    };

    if inputs.len() != function.inputs().len() {
        return Err(AbiError::TypeMismatch {
            expected: format!("{} input values", function.inputs().len()),
            got: inputs.len().to_string(),
        });
    }
    for (param, value) in function.inputs().iter().zip(inputs) {
        check_type(value, &param.kind)?;
    }
    let stack = inputs
        .iter()
        .map(value_to_stack_item)
        .collect::<AbiResult<Vec<_>>>()?;

    let outcome = executor.run(VmInvocation {
        code,
        data,
        address: account.address(),
        balance: account.balance,
        now_ms: account.sync_time,
        selector: function.input_id(),
        stack,
    })?;
    if outcome.exit_code != 0 {
        return Err(AbiError::VmError {
            exit_code: outcome.exit_code,
        });
    }

    let outputs = function.outputs();
    if outcome.stack.len() < outputs.len() {
        return Err(AbiError::OutputTypeMismatch {
            expected: format!("{} stack items", outputs.len()),
        });
    }
    let top = &outcome.stack[outcome.stack.len() - outputs.len()..];
    top.iter()
        .zip(outputs)
        .map(|(item, param)| stack_item_to_value(item, &param.kind))
        .collect()
}

/// Convert a typed value into its VM stack form.
///
/// Integers widen to VM integers (`true` is `-1`), cells and byte
/// chains push as cells, addresses as slices, tuples unfold to nested
/// stacks.
pub fn value_to_stack_item(value: &Value) -> AbiResult<StackItem> {
    Ok(match value {
        Value::Uint { value, .. } => StackItem::Int(value.clone().into()),
        Value::Int { value, .. } => StackItem::Int(value.clone()),
        Value::Bool(bit) => StackItem::Int(BigInt::from(if *bit { -1 } else { 0 })),
        Value::Gram(amount) => StackItem::Int((*amount).into()),
        Value::Time(time) => StackItem::Int((*time).into()),
        Value::Expire(expire) => StackItem::Int((*expire).into()),
        Value::PublicKey(key) => StackItem::Int(match key {
            Some(key) => BigUint::from_bytes_be(key).into(),
            None => BigInt::from(0),
        }),
        Value::Cell(cell) => StackItem::Cell(cell.clone()),
        Value::Bytes(bytes) | Value::FixedBytes(bytes) => {
            StackItem::Cell(Arc::new(build_byte_chain(bytes)?))
        }
        Value::Address(address) => {
            let mut builder = CellBuilder::new();
            address.store(&mut builder).stored()?;
            StackItem::Slice(Arc::new(builder.into_cell()).slice())
        }
        Value::Tuple(items) => StackItem::Tuple(
            items
                .iter()
                .map(value_to_stack_item)
                .collect::<AbiResult<_>>()?,
        ),
        Value::Array(..) | Value::FixedArray(..) | Value::Map(..) => {
            return Err(AbiError::ser(format!(
                "`{}` cannot be passed on the VM stack",
                value.type_signature()
            )));
        }
    })
}

/// Convert a VM stack item back into a typed value.
pub fn stack_item_to_value(item: &StackItem, kind: &ParamType) -> AbiResult<Value> {
    let mismatch = || AbiError::OutputTypeMismatch {
        expected: kind.type_signature(),
    };
    Ok(match (kind, item) {
        (ParamType::Uint(size), StackItem::Int(int)) => {
            let value = int.to_biguint().ok_or_else(mismatch)?;
            if value.bits() as usize > *size {
                return Err(mismatch());
            }
            Value::Uint { size: *size, value }
        }
        (ParamType::Int(size), StackItem::Int(int)) => {
            check_int_range(int, *size).map_err(|_| mismatch())?;
            Value::Int {
                size: *size,
                value: int.clone(),
            }
        }
        (ParamType::Bool, StackItem::Int(int)) => Value::Bool(!int.is_zero()),
        (ParamType::Gram, StackItem::Int(int)) => Value::Gram(
            int.to_u128()
                .filter(|amount| *amount < 1 << 120)
                .ok_or_else(mismatch)?,
        ),
        (ParamType::Time, StackItem::Int(int)) => Value::Time(int.to_u64().ok_or_else(mismatch)?),
        (ParamType::Expire, StackItem::Int(int)) => {
            Value::Expire(int.to_u32().ok_or_else(mismatch)?)
        }
        (ParamType::PublicKey, StackItem::Int(int)) => Value::PublicKey(if int.is_zero() {
            None
        } else {
            let raw = int.to_biguint().ok_or_else(mismatch)?;
            if raw.bits() > 256 {
                return Err(mismatch());
            }
            let bytes = raw.to_bytes_be();
            let mut key = [0; 32];
            key[32 - bytes.len()..].copy_from_slice(&bytes);
            Some(key)
        }),
        (ParamType::Cell, StackItem::Cell(cell)) => Value::Cell(cell.clone()),
        (ParamType::Bytes, StackItem::Cell(cell)) => {
            Value::Bytes(read_byte_chain(cell.clone())?)
        }
        (ParamType::FixedBytes(size), StackItem::Cell(cell)) => {
            let bytes = read_byte_chain(cell.clone())?;
            if bytes.len() != *size {
                return Err(mismatch());
            }
            Value::FixedBytes(bytes)
        }
        (ParamType::Address, StackItem::Slice(slice)) => {
            let mut slice = slice.clone();
            Value::Address(MsgAddress::load(&mut slice).map_err(|_| mismatch())?)
        }
        (ParamType::Address, StackItem::Cell(cell)) => {
            Value::Address(MsgAddress::load(&mut cell.slice()).map_err(|_| mismatch())?)
        }
        (ParamType::Tuple(params), StackItem::Tuple(items)) => {
            if params.len() != items.len() {
                return Err(mismatch());
            }
            Value::Tuple(
                items
                    .iter()
                    .zip(params)
                    .map(|(item, param)| stack_item_to_value(item, &param.kind))
                    .collect::<AbiResult<_>>()?,
            )
        }
        _ => return Err(mismatch()),
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::account::AccountStateDetails;
    use crate::param::Param;

    use super::*;

    /// Executor that records the invocation and replays a canned
    /// outcome; with no canned stack it echoes the input stack back.
    #[derive(Default)]
    struct Scripted {
        exit_code: i32,
        result: Option<Vec<StackItem>>,
        seen_selector: Option<u32>,
    }

    impl VmExecutor for Scripted {
        fn run(&mut self, invocation: VmInvocation) -> AbiResult<VmOutcome> {
            self.seen_selector = Some(invocation.selector);
            Ok(VmOutcome {
                exit_code: self.exit_code,
                stack: self.result.clone().unwrap_or(invocation.stack),
            })
        }
    }

    fn active_account() -> AccountStateInfo {
        AccountStateInfo {
            workchain: 0,
            address_hash: [1; 32],
            sync_time: 1_700_000_000_000,
            balance: 1_000_000_000,
            state: AccountState::Active,
            last_transaction_lt: 42,
            last_transaction_hash: [2; 32],
            details: AccountStateDetails {
                code: Some(Arc::new(Cell::default())),
                data: Some(Arc::new(Cell::default())),
            },
        }
    }

    fn mirror(params: Vec<Param>) -> Function {
        Function::new("mirror", vec![], params.clone(), params)
    }

    #[test]
    fn inactive_account() {
        let function = mirror(vec![]);
        let mut account = active_account();
        account.state = AccountState::Frozen;
        assert_eq!(
            run_get_method(&mut Scripted::default(), &account, &function, &[]).unwrap_err(),
            AbiError::AccountInactive,
        );
    }

    #[test]
    fn missing_code() {
        let function = mirror(vec![]);
        let mut account = active_account();
        account.details.code = None;
        assert_eq!(
            run_get_method(&mut Scripted::default(), &account, &function, &[]).unwrap_err(),
            AbiError::AccountInactive,
        );
    }

    #[test]
    fn vm_exit_code() {
        let function = mirror(vec![]);
        let mut executor = Scripted {
            exit_code: 13,
            ..Default::default()
        };
        assert_eq!(
            run_get_method(&mut executor, &active_account(), &function, &[]).unwrap_err(),
            AbiError::VmError { exit_code: 13 },
        );
    }

    #[test]
    fn selector_is_input_id() {
        let function = mirror(vec![]);
        let mut executor = Scripted::default();
        run_get_method(&mut executor, &active_account(), &function, &[]).unwrap();
        assert_eq!(executor.seen_selector, Some(function.input_id()));
    }

    #[test]
    fn echoed_values_roundtrip() {
        let mut payload = Cell::builder();
        payload.store_uint(0xF00D, 16).unwrap();

        let function = mirror(vec![
            Param::new("a", ParamType::Uint(32)),
            Param::new("b", ParamType::Bool),
            Param::new("c", ParamType::Cell),
            Param::new("d", ParamType::Tuple(vec![
                Param::new("e", ParamType::Gram),
                Param::new("f", ParamType::Address),
            ])),
        ]);
        let inputs = vec![
            Value::uint(32, 7u8),
            Value::Bool(true),
            Value::Cell(Arc::new(payload.into_cell())),
            Value::Tuple(vec![
                Value::Gram(13),
                Value::Address(MsgAddress {
                    workchain_id: -1,
                    address: [9; 32],
                }),
            ]),
        ];
        let outputs = run_get_method(
            &mut Scripted::default(),
            &active_account(),
            &function,
            &inputs,
        )
        .unwrap();
        assert_eq!(outputs, inputs);
    }

    #[test]
    fn takes_top_of_stack() {
        let function = mirror(vec![Param::new("x", ParamType::Uint(8))]);
        let mut executor = Scripted {
            result: Some(vec![
                StackItem::Null,
                StackItem::Int(BigInt::from(200)),
            ]),
            ..Default::default()
        };
        let outputs = run_get_method(
            &mut executor,
            &active_account(),
            &function,
            &[Value::uint(8, 0u8)],
        )
        .unwrap();
        assert_eq!(outputs, vec![Value::uint(8, 200u8)]);
    }

    #[test]
    fn output_conversion_failure() {
        let function = mirror(vec![Param::new("x", ParamType::Uint(8))]);
        let mut executor = Scripted {
            result: Some(vec![StackItem::Int(BigInt::from(256))]),
            ..Default::default()
        };
        assert_eq!(
            run_get_method(
                &mut executor,
                &active_account(),
                &function,
                &[Value::uint(8, 0u8)],
            )
            .unwrap_err(),
            AbiError::OutputTypeMismatch {
                expected: "uint8".to_string()
            },
        );
    }

    #[rstest]
    #[case(Value::Bool(true))]
    #[case(Value::Bool(false))]
    #[case(Value::uint(77, 123u8))]
    #[case(Value::int(77, -123))]
    #[case(Value::Gram(7))]
    #[case(Value::Time(1_700_000_000_000))]
    #[case(Value::Expire(1_700_000_060))]
    #[case(Value::PublicKey(None))]
    #[case(Value::PublicKey(Some([3; 32])))]
    #[case(Value::Bytes(vec![1, 2, 3]))]
    #[case(Value::FixedBytes(vec![0; 200]))]
    #[case(Value::Address(MsgAddress::NULL))]
    fn stack_conversions(#[case] value: Value) {
        let item = value_to_stack_item(&value).unwrap();
        assert_eq!(stack_item_to_value(&item, &value.param_type()).unwrap(), value);
    }

    /// Some executors hand addresses back as cells rather than slices.
    #[test]
    fn address_from_cell_item() {
        let address = MsgAddress {
            workchain_id: 0,
            address: [0xCD; 32],
        };
        let mut builder = CellBuilder::new();
        address.store(&mut builder).unwrap();
        let item = StackItem::Cell(Arc::new(builder.into_cell()));
        assert_eq!(
            stack_item_to_value(&item, &ParamType::Address).unwrap(),
            Value::Address(address),
        );
    }

    #[test]
    fn arrays_have_no_stack_form() {
        let value = Value::Array(ParamType::Bool.into(), vec![]);
        assert!(matches!(
            value_to_stack_item(&value),
            Err(AbiError::Serialization(_)),
        ));
    }
}
