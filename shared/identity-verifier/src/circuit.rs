//! Public-signal layouts of the disclosure circuits.
//!
//! Every circuit exposes its revealed credential bytes packed little-endian, 31 bytes per
//! field element, followed by five fixed signals: nullifier, attestation id, scope,
//! user identifier and current date.

use std::ops::Range;

use crate::constants::REVEALED_BYTES_PER_ELEMENT;
use crate::types::{AttestationId, CountryCode, DisclosureField, FieldElement};

/// Number of signals that follow the revealed data.
const FIXED_SIGNALS: usize = 5;

/// Byte ranges of each credential field inside the unpacked revealed data.
#[derive(Debug)]
pub struct CircuitLayout {
    revealed_elements: usize,
    issuing_state: Range<usize>,
    name: Range<usize>,
    document_number: Range<usize>,
    nationality: Range<usize>,
    date_of_birth: Range<usize>,
    gender: Range<usize>,
    expiry_date: Range<usize>,
    older_than: Range<usize>,
    ofac: Range<usize>,
}

static PASSPORT_LAYOUT: CircuitLayout = CircuitLayout {
    revealed_elements: 3,
    issuing_state: 2..5,
    name: 5..44,
    document_number: 44..53,
    nationality: 54..57,
    date_of_birth: 57..63,
    gender: 64..65,
    expiry_date: 65..71,
    older_than: 88..90,
    ofac: 90..93,
};

static EU_ID_CARD_LAYOUT: CircuitLayout = CircuitLayout {
    revealed_elements: 4,
    issuing_state: 2..5,
    name: 60..90,
    document_number: 5..14,
    nationality: 45..48,
    date_of_birth: 30..36,
    gender: 37..38,
    expiry_date: 38..44,
    older_than: 90..92,
    ofac: 92..94,
};

impl CircuitLayout {
    /// Layout of the circuit that proves `attestation_id`.
    #[must_use]
    pub fn for_attestation(attestation_id: AttestationId) -> &'static Self {
        match attestation_id {
            AttestationId::Passport => &PASSPORT_LAYOUT,
            AttestationId::EuIdCard => &EU_ID_CARD_LAYOUT,
        }
    }

    /// Total number of public signals.
    #[must_use]
    pub const fn signal_count(&self) -> usize {
        self.revealed_elements + FIXED_SIGNALS
    }

    /// Number of revealed bytes carried by the packed elements.
    #[must_use]
    pub const fn revealed_len(&self) -> usize {
        self.revealed_elements * REVEALED_BYTES_PER_ELEMENT
    }

    /// Byte range of `field` inside the revealed data.
    #[must_use]
    pub fn range(&self, field: DisclosureField) -> Range<usize> {
        match field {
            DisclosureField::IssuingState => self.issuing_state.clone(),
            DisclosureField::Name => self.name.clone(),
            DisclosureField::DocumentNumber => self.document_number.clone(),
            DisclosureField::Nationality => self.nationality.clone(),
            DisclosureField::DateOfBirth => self.date_of_birth.clone(),
            DisclosureField::Gender => self.gender.clone(),
            DisclosureField::ExpiryDate => self.expiry_date.clone(),
            DisclosureField::OlderThan => self.older_than.clone(),
            DisclosureField::Ofac => self.ofac.clone(),
        }
    }
}

/// Packs revealed bytes into field elements, 31 bytes little-endian per element.
#[must_use]
pub fn pack_revealed(bytes: &[u8]) -> Vec<FieldElement> {
    bytes
        .chunks(REVEALED_BYTES_PER_ELEMENT)
        .map(FieldElement::from_le_slice)
        .collect()
}

/// Inverse of [`pack_revealed`].
#[must_use]
pub fn unpack_revealed(elements: &[FieldElement]) -> Vec<u8> {
    elements
        .iter()
        .flat_map(|element| {
            let bytes = element.to_le_bytes();
            bytes[..REVEALED_BYTES_PER_ELEMENT].to_vec()
        })
        .collect()
}

/// Public signals checked against a circuit layout.
#[derive(Debug, Clone, Copy)]
pub struct CircuitSignals<'a> {
    layout: &'static CircuitLayout,
    signals: &'a [FieldElement],
}

impl<'a> CircuitSignals<'a> {
    /// Returns `None` if the number of signals does not match the layout.
    #[must_use]
    pub fn new(layout: &'static CircuitLayout, signals: &'a [FieldElement]) -> Option<Self> {
        (signals.len() == layout.signal_count()).then_some(Self { layout, signals })
    }

    fn fixed(&self, offset: usize) -> FieldElement {
        self.signals[self.layout.revealed_elements + offset]
    }

    #[must_use]
    pub fn nullifier(&self) -> FieldElement {
        self.fixed(0)
    }

    #[must_use]
    pub fn attestation_id(&self) -> FieldElement {
        self.fixed(1)
    }

    #[must_use]
    pub fn scope(&self) -> FieldElement {
        self.fixed(2)
    }

    #[must_use]
    pub fn user_identifier(&self) -> FieldElement {
        self.fixed(3)
    }

    /// Proof date as a `YYYYMMDD` number.
    #[must_use]
    pub fn current_date(&self) -> FieldElement {
        self.fixed(4)
    }

    /// Unpacked revealed credential bytes.
    #[must_use]
    pub fn revealed_data(&self) -> RevealedData {
        RevealedData {
            layout: self.layout,
            bytes: unpack_revealed(&self.signals[..self.layout.revealed_elements]),
        }
    }
}

/// Revealed credential bytes with field accessors.
///
/// A field the holder did not reveal is all zero bytes. OFAC flags are one byte per list.
/// The holder is cleared only when every list reports `1`: a `0` next to revealed flags is
/// a list that was not screened, and any other value means the holder is listed.
#[derive(Debug, Clone)]
pub struct RevealedData {
    layout: &'static CircuitLayout,
    bytes: Vec<u8>,
}

impl RevealedData {
    fn raw(&self, field: DisclosureField) -> Option<&[u8]> {
        let raw = self.bytes.get(self.layout.range(field))?;
        raw.iter().any(|&b| b != 0).then_some(raw)
    }

    fn text(&self, field: DisclosureField) -> Option<String> {
        let raw = self.raw(field)?;
        let text = String::from_utf8_lossy(raw);
        Some(text.trim_matches('\0').to_string())
    }

    /// Display value of `field`, or `None` if the credential does not reveal it.
    #[must_use]
    pub fn value(&self, field: DisclosureField) -> Option<String> {
        match field {
            DisclosureField::OlderThan => self.older_than().map(|age| age.to_string()),
            DisclosureField::Ofac => self.ofac_cleared().map(|cleared| cleared.to_string()),
            DisclosureField::Name => self.text(field).map(|name| format_mrz_name(&name)),
            DisclosureField::IssuingState | DisclosureField::Nationality => self.text(field),
            _ => self
                .text(field)
                .map(|text| text.trim_end_matches('<').to_string()),
        }
    }

    /// Minimum age proven by the circuit.
    #[must_use]
    pub fn older_than(&self) -> Option<u8> {
        let raw = self.raw(DisclosureField::OlderThan)?;
        std::str::from_utf8(raw).ok()?.parse().ok()
    }

    /// Holder nationality.
    #[must_use]
    pub fn nationality(&self) -> Option<CountryCode> {
        CountryCode::parse(&self.text(DisclosureField::Nationality)?).ok()
    }

    /// Whether every OFAC list cleared the holder. `None` if the flags were not revealed.
    ///
    /// An unscreened list counts against the holder, so `[1, 0, 0]` is not cleared.
    #[must_use]
    pub fn ofac_cleared(&self) -> Option<bool> {
        self.raw(DisclosureField::Ofac)
            .map(|flags| flags.iter().all(|&flag| flag == 1))
    }
}

/// `SURNAME<<GIVEN<NAMES` to `GIVEN NAMES SURNAME`.
fn format_mrz_name(raw: &str) -> String {
    let trimmed = raw.trim_end_matches('<');
    let spaced = |s: &str| s.replace('<', " ").trim().to_string();

    match trimmed.split_once("<<") {
        Some((surname, given)) => format!("{} {}", spaced(given), spaced(surname))
            .trim()
            .to_string(),
        None => spaced(trimmed),
    }
}
