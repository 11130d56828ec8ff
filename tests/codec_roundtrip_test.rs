use authsettle::error::ProtocolError;
use authsettle::interfaces::iso8583::{
    Bitmap, DataType, FieldSpec, LengthEncoding, MessageCodec, Mti, WireMessage,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DECLARED: [u8; 21] = [
    2, 3, 4, 7, 11, 12, 13, 14, 18, 22, 24, 25, 32, 37, 38, 39, 41, 42, 43, 48, 49,
];

fn random_byte(rng: &mut StdRng, data_type: DataType) -> u8 {
    const ALNUM: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789 ";
    match data_type {
        DataType::Numeric => b'0' + rng.gen_range(0..10u8),
        DataType::AlphaNumeric => ALNUM[rng.gen_range(0..ALNUM.len())],
        DataType::AlphaNumericSpecial => rng.gen_range(0x20..=0x7Eu8),
        DataType::Binary => rng.gen_range(0..=u8::MAX),
    }
}

/// A value the field accepts. Fixed fields get their full width so the
/// decoded value is byte-identical.
fn random_value(rng: &mut StdRng, spec: &FieldSpec) -> Vec<u8> {
    let length = match spec.length_encoding {
        LengthEncoding::Fixed => spec.effective_max(),
        _ => rng.gen_range(0..=spec.effective_max().min(120)),
    };
    (0..length).map(|_| random_byte(rng, spec.data_type)).collect()
}

#[test]
fn test_random_messages_round_trip() {
    let codec = MessageCodec::default();
    let mut rng = StdRng::seed_from_u64(0x8583);

    for _ in 0..500 {
        let mut message = WireMessage::new(Mti::authorization_request());
        for number in DECLARED {
            if rng.gen_range(0..2) == 1 {
                let spec = codec.specs().get(number);
                message.set_field(number, random_value(&mut rng, &spec));
            }
        }
        // one undeclared field now and then
        if rng.gen_range(0..4) == 0 {
            let spec = codec.specs().get(60);
            message.set_field(60, random_value(&mut rng, &spec));
        }

        let bytes = codec.encode(&message).unwrap();
        let decoded = codec.decode(&bytes).unwrap();
        assert_eq!(decoded, message);
        assert_eq!(codec.encode(&decoded).unwrap(), bytes);
    }
}

#[test]
fn test_bitmap_bit_positions() {
    let bitmap = Bitmap::from_fields([2, 64]).unwrap();
    assert_eq!(bitmap.to_hex(), "4000000000000001");

    let codec = MessageCodec::default();
    let message = WireMessage::new(Mti::network_management_request())
        .with_field(2, "4111111111111111")
        .with_field(64, "MAC");
    let bytes = codec.encode(&message).unwrap();
    assert_eq!(&bytes[4..20], b"4000000000000001");
    assert_eq!(&bytes[20..], b"164111111111111111003MAC");
}

#[test]
fn test_fields_beyond_primary_bitmap_are_refused() {
    let codec = MessageCodec::default();

    let secondary = WireMessage::new(Mti::authorization_request()).with_field(1, "x");
    assert!(matches!(
        codec.encode(&secondary),
        Err(ProtocolError::SecondaryBitmap)
    ));

    let out_of_range = WireMessage::new(Mti::authorization_request()).with_field(65, "x");
    assert!(codec.encode(&out_of_range).is_err());
}

#[test]
fn test_truncated_input_never_decodes() {
    let codec = MessageCodec::default();
    let mut rng = StdRng::seed_from_u64(42);
    let message = WireMessage::new(Mti::authorization_request())
        .with_field(2, "4111111111111111")
        .with_field(4, "000000010000")
        .with_field(48, random_value(&mut rng, &codec.specs().get(48)));
    let bytes = codec.encode(&message).unwrap();

    for cut in 0..bytes.len() {
        assert!(codec.decode(&bytes[..cut]).is_err(), "decoded a {cut}-byte prefix");
    }
}

#[test]
fn test_lllvar_boundary() {
    let codec = MessageCodec::default();

    let at_limit = WireMessage::new(Mti::authorization_request()).with_field(48, "x".repeat(999));
    let bytes = codec.encode(&at_limit).unwrap();
    assert_eq!(&bytes[20..23], b"999");
    assert_eq!(codec.decode(&bytes).unwrap(), at_limit);

    let over = WireMessage::new(Mti::authorization_request()).with_field(48, "x".repeat(1000));
    assert!(matches!(
        codec.encode(&over),
        Err(ProtocolError::FieldTooLong {
            field: 48,
            length: 1000,
            max: 999
        })
    ));
}
