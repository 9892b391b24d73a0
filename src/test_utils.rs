//! Frame builders for tests.

use bytes::{BufMut, Bytes, BytesMut};

use crate::types::{MacAddress, SV_ETHER_TYPE, VLAN_ETHER_TYPE};

/// Append one TLV with a definite BER length.
pub fn put_tlv(buf: &mut BytesMut, tag: u8, value: &[u8]) {
    buf.put_u8(tag);
    match value.len() {
        n if n < 0x80 => buf.put_u8(n as u8),
        n if n <= 0xFF => {
            buf.put_u8(0x81);
            buf.put_u8(n as u8);
        }
        n => {
            buf.put_u8(0x82);
            buf.put_u16(n as u16);
        }
    }
    buf.put_slice(value);
}

/// Builds the `0x30` element of one ASDU.
#[derive(Debug, Clone, Default)]
pub struct AsduBuilder {
    sv_id: Option<String>,
    dat_set: Option<String>,
    smp_cnt: Option<u16>,
    conf_rev: Option<u32>,
    refr_tm: Option<[u8; 8]>,
    smp_synch: Option<u8>,
    smp_rate: Option<u16>,
    data: Option<Vec<u8>>,
    smp_mod: Option<u16>,
    gm_identity: Option<[u8; 8]>,
    extra: Vec<(u8, Vec<u8>)>,
}

impl AsduBuilder {
    pub fn new(sv_id: &str) -> Self {
        Self {
            sv_id: Some(sv_id.to_owned()),
            ..Default::default()
        }
    }

    pub fn without_sv_id() -> Self {
        Self::default()
    }

    pub fn dat_set(mut self, dat_set: &str) -> Self {
        self.dat_set = Some(dat_set.to_owned());
        self
    }

    pub fn smp_cnt(mut self, smp_cnt: u16) -> Self {
        self.smp_cnt = Some(smp_cnt);
        self
    }

    pub fn conf_rev(mut self, conf_rev: u32) -> Self {
        self.conf_rev = Some(conf_rev);
        self
    }

    pub fn refr_tm(mut self, refr_tm: [u8; 8]) -> Self {
        self.refr_tm = Some(refr_tm);
        self
    }

    pub fn smp_synch(mut self, smp_synch: u8) -> Self {
        self.smp_synch = Some(smp_synch);
        self
    }

    pub fn smp_rate(mut self, smp_rate: u16) -> Self {
        self.smp_rate = Some(smp_rate);
        self
    }

    pub fn data(mut self, data: &[u8]) -> Self {
        self.data = Some(data.to_vec());
        self
    }

    pub fn smp_mod(mut self, smp_mod: u16) -> Self {
        self.smp_mod = Some(smp_mod);
        self
    }

    pub fn gm_identity(mut self, gm_identity: [u8; 8]) -> Self {
        self.gm_identity = Some(gm_identity);
        self
    }

    /// Append an element with an arbitrary tag after the known ones.
    pub fn extra(mut self, tag: u8, value: &[u8]) -> Self {
        self.extra.push((tag, value.to_vec()));
        self
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut body = BytesMut::new();
        if let Some(sv_id) = &self.sv_id {
            put_tlv(&mut body, 0x80, sv_id.as_bytes());
        }
        if let Some(dat_set) = &self.dat_set {
            put_tlv(&mut body, 0x81, dat_set.as_bytes());
        }
        if let Some(smp_cnt) = self.smp_cnt {
            put_tlv(&mut body, 0x82, &smp_cnt.to_be_bytes());
        }
        if let Some(conf_rev) = self.conf_rev {
            put_tlv(&mut body, 0x83, &conf_rev.to_be_bytes());
        }
        if let Some(refr_tm) = &self.refr_tm {
            put_tlv(&mut body, 0x84, refr_tm);
        }
        if let Some(smp_synch) = self.smp_synch {
            put_tlv(&mut body, 0x85, &[smp_synch]);
        }
        if let Some(smp_rate) = self.smp_rate {
            put_tlv(&mut body, 0x86, &smp_rate.to_be_bytes());
        }
        if let Some(data) = &self.data {
            put_tlv(&mut body, 0x87, data);
        }
        if let Some(smp_mod) = self.smp_mod {
            put_tlv(&mut body, 0x88, &smp_mod.to_be_bytes());
        }
        if let Some(gm_identity) = &self.gm_identity {
            put_tlv(&mut body, 0x89, gm_identity);
        }
        for (tag, value) in &self.extra {
            put_tlv(&mut body, *tag, value);
        }

        let mut out = BytesMut::new();
        put_tlv(&mut out, 0x30, &body);
        out.to_vec()
    }
}

/// Builds a complete Ethernet frame carrying one SV PDU.
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    destination: MacAddress,
    source: MacAddress,
    vlan_tci: Option<u16>,
    ether_type: u16,
    app_id: u16,
    reserved1: u16,
    no_asdu: Option<u32>,
    security: Option<Vec<u8>>,
    asdus: Vec<Vec<u8>>,
    padding: usize,
}

impl FrameBuilder {
    pub fn new(app_id: u16) -> Self {
        Self {
            destination: MacAddress::new([0x01, 0x0C, 0xCD, 0x04, 0x00, 0x01]),
            source: MacAddress::new([0x00, 0x1B, 0x21, 0x0A, 0x0B, 0x0C]),
            vlan_tci: None,
            ether_type: SV_ETHER_TYPE,
            app_id,
            reserved1: 0,
            no_asdu: None,
            security: None,
            asdus: Vec::new(),
            padding: 0,
        }
    }

    pub fn destination(mut self, mac: MacAddress) -> Self {
        self.destination = mac;
        self
    }

    pub fn source(mut self, mac: MacAddress) -> Self {
        self.source = mac;
        self
    }

    pub fn vlan(mut self, tci: u16) -> Self {
        self.vlan_tci = Some(tci);
        self
    }

    pub fn ether_type(mut self, ether_type: u16) -> Self {
        self.ether_type = ether_type;
        self
    }

    pub fn simulated(mut self) -> Self {
        self.reserved1 |= 0x8000;
        self
    }

    /// Override the announced ASDU count.
    pub fn no_asdu(mut self, no_asdu: u32) -> Self {
        self.no_asdu = Some(no_asdu);
        self
    }

    pub fn security(mut self, security: &[u8]) -> Self {
        self.security = Some(security.to_vec());
        self
    }

    pub fn asdu(mut self, asdu: AsduBuilder) -> Self {
        self.asdus.push(asdu.encode());
        self
    }

    /// Append an already encoded ASDU element.
    pub fn raw_asdu(mut self, encoded: &[u8]) -> Self {
        self.asdus.push(encoded.to_vec());
        self
    }

    /// Ethernet padding after the PDU.
    pub fn padding(mut self, padding: usize) -> Self {
        self.padding = padding;
        self
    }

    /// Encoded APDU (the `savPdu` element).
    pub fn encode_apdu(&self) -> Vec<u8> {
        let mut seq = BytesMut::new();
        for asdu in &self.asdus {
            seq.put_slice(asdu);
        }

        let no_asdu = self.no_asdu.unwrap_or(self.asdus.len() as u32);
        let mut body = BytesMut::new();
        put_tlv(&mut body, 0x80, &[no_asdu as u8]);
        if let Some(security) = &self.security {
            put_tlv(&mut body, 0x81, security);
        }
        put_tlv(&mut body, 0xA2, &seq);

        let mut apdu = BytesMut::new();
        put_tlv(&mut apdu, 0x60, &body);
        apdu.to_vec()
    }

    /// Complete frame with a length field covering the APDU.
    pub fn build(&self) -> Bytes {
        let apdu = self.encode_apdu();
        self.build_with_length(8 + apdu.len() as u16)
    }

    /// Complete frame with an explicit SV length field.
    pub fn build_with_length(&self, length: u16) -> Bytes {
        let apdu = self.encode_apdu();
        let mut buf = BytesMut::with_capacity(26 + apdu.len() + self.padding);
        buf.put_slice(&self.destination.octets());
        buf.put_slice(&self.source.octets());
        if let Some(tci) = self.vlan_tci {
            buf.put_u16(VLAN_ETHER_TYPE);
            buf.put_u16(tci);
        }
        buf.put_u16(self.ether_type);
        buf.put_u16(self.app_id);
        buf.put_u16(length);
        buf.put_u16(self.reserved1);
        buf.put_u16(0);
        buf.put_slice(&apdu);
        buf.put_bytes(0, self.padding);
        buf.freeze()
    }
}

/// The frame used throughout the tests: APPID 0x4000, svID "SMP1",
/// smpCnt 100 and the data block `00 00 00 2A 00 00 00 00`.
pub fn reference_frame(app_id: u16) -> Bytes {
    FrameBuilder::new(app_id)
        .asdu(
            AsduBuilder::new("SMP1")
                .smp_cnt(100)
                .conf_rev(1)
                .smp_synch(2)
                .data(&[0x00, 0x00, 0x00, 0x2A, 0x00, 0x00, 0x00, 0x00]),
        )
        .build()
}

/// Frame whose seqData declares 20 bytes while only 8 follow.
pub fn overrun_frame(app_id: u16) -> Bytes {
    let mut body = BytesMut::new();
    put_tlv(&mut body, 0x80, b"SMP1");
    put_tlv(&mut body, 0x82, &100u16.to_be_bytes());
    body.put_slice(&[0x87, 20]);
    body.put_slice(&[0x00, 0x00, 0x00, 0x2A, 0x00, 0x00, 0x00, 0x00]);
    let mut asdu = BytesMut::new();
    put_tlv(&mut asdu, 0x30, &body);

    FrameBuilder::new(app_id).raw_asdu(&asdu).build()
}
