//! SV PDU decoder.
//!
//! Decoding walks the BER structure of the APDU:
//!
//! ```text
//! savPdu      0x60
//!   noASDU    0x80
//!   security  0x81 (optional, kept opaque)
//!   seqASDU   0xA2
//!     ASDU    0x30  (repeated)
//!       svID 0x80, datSet 0x81, smpCnt 0x82, confRev 0x83, refrTm 0x84,
//!       smpSynch 0x85, smpRate 0x86, seqData 0x87, smpMod 0x88, gmIdentity 0x89
//! ```
//!
//! Unknown elements are skipped at every level. A length that runs past
//! its enclosing element is a hard error, so nothing is ever read beyond the
//! declared SV length of the frame.

use crate::ber::{decode_uint, decode_visible_string, Tlv, TlvReader};
use crate::error::DecodeError;
use crate::types::{Asdu, SmpMod, SmpSynch, SvHeader, SvPdu, UtcTime, UTC_TIME_LENGTH};

const TAG_SAV_PDU: u8 = 0x60;
const TAG_NO_ASDU: u8 = 0x80;
const TAG_SECURITY: u8 = 0x81;
const TAG_SEQ_ASDU: u8 = 0xA2;
const TAG_ASDU: u8 = 0x30;

const TAG_SV_ID: u8 = 0x80;
const TAG_DAT_SET: u8 = 0x81;
const TAG_SMP_CNT: u8 = 0x82;
const TAG_CONF_REV: u8 = 0x83;
const TAG_REFR_TM: u8 = 0x84;
const TAG_SMP_SYNCH: u8 = 0x85;
const TAG_SMP_RATE: u8 = 0x86;
const TAG_SEQ_DATA: u8 = 0x87;
const TAG_SMP_MOD: u8 = 0x88;
const TAG_GM_IDENTITY: u8 = 0x89;

/// Decode a complete Ethernet frame.
///
/// # Example
///
/// ```rust,ignore
/// let pdu = decode_frame(&frame)?;
/// for asdu in &pdu.asdus {
///     println!("{:?} smpCnt={}", asdu.sv_id, asdu.smp_cnt);
/// }
/// ```
pub fn decode_frame(frame: &[u8]) -> Result<SvPdu<'_>, DecodeError> {
    let (header, apdu) = SvHeader::parse(frame)?;
    decode_pdu(header, apdu)
}

/// Decode the APDU that follows an already parsed header.
///
/// `apdu` is the slice delimited by the header's length field. Offsets in
/// errors are relative to it.
pub fn decode_pdu(header: SvHeader, apdu: &[u8]) -> Result<SvPdu<'_>, DecodeError> {
    let mut reader = TlvReader::new(apdu);
    let sav_pdu = reader.expect(TAG_SAV_PDU)?;

    let mut pdu = SvPdu {
        header,
        no_asdu: 0,
        security: None,
        asdus: Vec::new(),
    };

    let mut elements = sav_pdu.children();
    while let Some(tlv) = elements.read()? {
        match tlv.tag {
            TAG_NO_ASDU => pdu.no_asdu = decode_uint(&tlv, "noASDU")?,
            TAG_SECURITY => pdu.security = Some(tlv.value),
            TAG_SEQ_ASDU => {
                pdu.asdus.reserve(pdu.no_asdu.min(16) as usize);
                let mut seq = tlv.children();
                while let Some(item) = seq.read()? {
                    if item.tag == TAG_ASDU {
                        pdu.asdus.push(decode_asdu(&item)?);
                    }
                }
            }
            _ => {}
        }
    }

    Ok(pdu)
}

/// Decode one `0x30` ASDU element.
fn decode_asdu<'a>(element: &Tlv<'a>) -> Result<Asdu<'a>, DecodeError> {
    let mut asdu = Asdu::default();

    let mut fields = element.children();
    while let Some(tlv) = fields.read()? {
        match tlv.tag {
            TAG_SV_ID => asdu.sv_id = Some(decode_visible_string(&tlv, "svID")?),
            TAG_DAT_SET => asdu.dat_set = Some(decode_visible_string(&tlv, "datSet")?),
            TAG_SMP_CNT => asdu.smp_cnt = decode_uint(&tlv, "smpCnt")?,
            TAG_CONF_REV => asdu.conf_rev = decode_uint(&tlv, "confRev")?,
            TAG_REFR_TM => {
                let bytes = fixed::<UTC_TIME_LENGTH>(&tlv, "refrTm")?;
                asdu.refr_tm = Some(UtcTime::from_bytes(bytes));
            }
            TAG_SMP_SYNCH => {
                asdu.smp_synch = Some(SmpSynch::from_u8(decode_uint(&tlv, "smpSynch")?));
            }
            TAG_SMP_RATE => asdu.smp_rate = Some(decode_uint(&tlv, "smpRate")?),
            TAG_SEQ_DATA => asdu.data = tlv.value,
            TAG_SMP_MOD => asdu.smp_mod = Some(SmpMod::from_u16(decode_uint(&tlv, "smpMod")?)),
            TAG_GM_IDENTITY => asdu.gm_identity = Some(fixed::<8>(&tlv, "gmIdentity")?),
            _ => {}
        }
    }

    Ok(asdu)
}

/// Value that must be exactly `N` octets.
fn fixed<const N: usize>(tlv: &Tlv<'_>, field: &'static str) -> Result<[u8; N], DecodeError> {
    tlv.value.try_into().map_err(|_| DecodeError::InvalidValue {
        field,
        offset: tlv.value_offset,
    })
}
