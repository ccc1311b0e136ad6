use core::fmt::{self, Debug, Display};
use core::str::FromStr;

use base64::{Engine, engine::general_purpose::STANDARD_NO_PAD, engine::general_purpose::URL_SAFE_NO_PAD};
use crc::Crc;
use strum::Display as StrumDisplay;

use crate::builder::CellBuilder;
use crate::error::{CellError, CellResult};
use crate::slice::CellSlice;

const CRC_16_XMODEM: Crc<u16> = Crc::<u16>::new(&crc::CRC_16_XMODEM);

/// [MsgAddress](https://docs.ton.org/develop/data-formats/msg-tlb#msgaddressext-tl-b)
/// ```tlb
/// addr_std$10 anycast:(Maybe Anycast)
/// workchain_id:int8 address:bits256  = MsgAddressInt;
/// ```
///
/// Stored with the `addr_std$10` layout (267 bits); `addr_none$00` and
/// 256-bit `addr_var$11` are accepted when loading.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MsgAddress {
    pub workchain_id: i32,
    pub address: [u8; 32],
}

impl MsgAddress {
    pub const NULL: Self = Self {
        workchain_id: 0,
        address: [0; 32],
    };

    /// Bit width of the stored `addr_std$10` form.
    pub const BITS: usize = 2 + 1 + 8 + 256;

    pub fn from_hex(s: impl AsRef<str>) -> CellResult<Self> {
        let s = s.as_ref();
        let (workchain, addr) = s
            .split_once(':')
            .ok_or_else(|| CellError::invalid("address must be <workchain>:<hex>"))?;
        let workchain_id = workchain
            .parse::<i32>()
            .map_err(|err| CellError::invalid(err.to_string()))?;
        let mut address = [0; 32];
        hex::decode_to_slice(addr, &mut address)
            .map_err(|err| CellError::invalid(err.to_string()))?;
        Ok(Self {
            workchain_id,
            address,
        })
    }

    /// [Raw](https://docs.ton.org/learn/overviews/addresses#raw-address)
    /// representation
    #[inline]
    pub fn to_hex(&self) -> String {
        format!("{}:{}", self.workchain_id, hex::encode(self.address))
    }

    /// Parse address from its base64
    /// [user-friendly](https://docs.ton.org/learn/overviews/addresses#user-friendly-address)
    /// representation, either URL-safe or standard.
    pub fn from_base64(s: impl AsRef<str>) -> CellResult<Self> {
        let s = s.as_ref();
        if s.contains(['-', '_']) {
            Self::from_base64_repr(URL_SAFE_NO_PAD, s)
        } else {
            Self::from_base64_repr(STANDARD_NO_PAD, s)
        }
    }

    fn from_base64_repr(engine: impl Engine, s: &str) -> CellResult<Self> {
        let mut bytes = [0; 36];
        if engine
            .decode_slice(s, &mut bytes)
            .map_err(|err| CellError::invalid(err.to_string()))?
            != bytes.len()
        {
            return Err(CellError::invalid("invalid length"));
        }
        match bytes[0] {
            0x11 | 0x51 | 0x91 | 0xD1 => {}
            flags => return Err(CellError::invalid(format!("unsupported flags: {flags:#x}"))),
        }
        let crc = ((bytes[34] as u16) << 8) | bytes[35] as u16;
        if crc != CRC_16_XMODEM.checksum(&bytes[0..34]) {
            return Err(CellError::invalid("CRC mismatch"));
        }
        let mut address = [0; 32];
        address.clone_from_slice(&bytes[2..34]);
        Ok(Self {
            workchain_id: bytes[1] as i8 as i32,
            address,
        })
    }

    /// Encode address as URL-safe base64 (bounceable, production).
    pub fn to_base64(&self) -> String {
        let mut bytes = [0; 36];
        bytes[0] = 0x11;
        bytes[1] = (self.workchain_id & 0xff) as u8;
        bytes[2..34].clone_from_slice(&self.address);
        let crc = CRC_16_XMODEM.checksum(&bytes[0..34]);
        bytes[34] = ((crc >> 8) & 0xff) as u8;
        bytes[35] = (crc & 0xff) as u8;
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Returns whether this address is [`NULL`](MsgAddress::NULL)
    #[inline]
    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    pub fn store(&self, builder: &mut CellBuilder) -> CellResult<()> {
        let workchain_id: i8 = self.workchain_id.try_into().map_err(|_| {
            CellError::invalid(format!(
                "workchain {} does not fit into int8",
                self.workchain_id
            ))
        })?;
        builder
            .store_uint(MsgAddressTag::Std as u64, 2)?
            // anycast:(Maybe Anycast)
            .store_bit(false)?
            // workchain_id:int8
            .store_int(workchain_id as i64, 8)?
            // address:bits256
            .store_bytes(self.address)?;
        Ok(())
    }

    pub fn load(slice: &mut CellSlice) -> CellResult<Self> {
        let tag = match slice.load_uint(2)? {
            0b00 => MsgAddressTag::Null,
            0b01 => MsgAddressTag::Extern,
            0b10 => MsgAddressTag::Std,
            0b11 => MsgAddressTag::Var,
            _ => unreachable!(),
        };
        match tag {
            MsgAddressTag::Null => Ok(Self::NULL),
            MsgAddressTag::Std => {
                // anycast:(Maybe Anycast)
                if slice.load_bit()? {
                    return Err(CellError::invalid("anycast addresses are not supported"));
                }
                Ok(Self {
                    // workchain_id:int8
                    workchain_id: slice.load_int(8)? as i32,
                    // address:bits256
                    address: slice.load_bytes_array()?,
                })
            }
            MsgAddressTag::Var => {
                // anycast:(Maybe Anycast)
                if slice.load_bit()? {
                    return Err(CellError::invalid("anycast addresses are not supported"));
                }
                // addr_len:(## 9)
                let addr_len = slice.load_uint(9)?;
                if addr_len != 256 {
                    return Err(CellError::invalid(format!(
                        "only 256-bit addresses are supported for addr_var$11, got {addr_len} bits"
                    )));
                }
                Ok(Self {
                    // workchain_id:int32
                    workchain_id: slice.load_int(32)? as i32,
                    // address:(bits addr_len)
                    address: slice.load_bytes_array()?,
                })
            }
            tag => Err(CellError::invalid(format!(
                "unsupported address tag: {tag}"
            ))),
        }
    }
}

impl Debug for MsgAddress {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_hex().as_str())
    }
}

impl Display for MsgAddress {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_base64().as_str())
    }
}

impl FromStr for MsgAddress {
    type Err = CellError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == 48 {
            Self::from_base64(s)
        } else {
            Self::from_hex(s)
        }
    }
}

#[derive(Clone, Copy, StrumDisplay)]
#[repr(u8)]
enum MsgAddressTag {
    #[strum(serialize = "addr_none$00")]
    Null,
    #[strum(serialize = "addr_extern$01")]
    Extern,
    #[strum(serialize = "addr_std$10")]
    Std,
    #[strum(serialize = "addr_var$11")]
    Var,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::cell::Cell;

    use super::*;

    #[test]
    fn parse_base64() {
        let addr: MsgAddress = "EQBGXZ9ddZeWypx8EkJieHJX75ct0bpkmu0Y4YoYr3NM0Z9e"
            .parse()
            .unwrap();
        assert_eq!(addr.workchain_id, 0);
    }

    #[test]
    fn hex_roundtrip() {
        let addr = MsgAddress {
            workchain_id: -1,
            address: [0xAB; 32],
        };
        assert_eq!(MsgAddress::from_hex(addr.to_hex()).unwrap(), addr);
    }

    #[test]
    fn stored_bits() {
        let mut b = Cell::builder();
        MsgAddress::NULL.store(&mut b).unwrap();
        let cell = b.into_cell();
        assert_eq!(cell.bits_len(), MsgAddress::BITS);
        // addr_std$10, anycast 0, workchain 0, zero hash
        assert!(cell.data()[0]);
        assert!(!cell.data()[1..].any());
    }

    #[test]
    fn cell_roundtrip() {
        let addr = MsgAddress {
            workchain_id: -1,
            address: [0x42; 32],
        };
        let mut b = Cell::builder();
        addr.store(&mut b).unwrap();
        let cell = Arc::new(b.into_cell());
        assert_eq!(MsgAddress::load(&mut cell.slice()).unwrap(), addr);
    }
}
