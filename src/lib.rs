#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

pub mod app;
pub mod conformance;
pub mod datalink;
pub mod encoding;
pub mod network;
pub mod object;
pub mod property;
pub mod service;
pub mod util;

// Re-export main types without glob imports to avoid conflicts
pub use app::{Apdu, ApduType, ApplicationError};
pub use datalink::{Bvlc, BvlcFunction, DataLinkError};
pub use encoding::{ApplicationTag, EncodingError, Tag, TagClass};
pub use network::{NetworkError, Npdu, NpduBody};
pub use object::{ObjectIdentifier, ObjectType, PropertyIdentifier};
pub use property::{ConstructedData, PrimitiveValue};
pub use service::{ConfirmedServiceChoice, ServiceError, UnconfirmedServiceChoice};

#[cfg(feature = "std")]
extern crate std;

#[cfg(not(feature = "std"))]
extern crate alloc;

pub const BACNET_PROTOCOL_VERSION: u8 = 1;
pub const BACNET_MAX_APDU: usize = 1476;
pub const BACNET_MAX_MPDU: usize = 1497;

#[cfg(test)]
mod tests {
    use crate::object::Segmentation;
    use crate::service::{IAmRequest, UnconfirmedServiceRequest};
    use crate::util::{decode_object_id, encode_object_id};
    use crate::{
        Apdu, Bvlc, Npdu, NpduBody, ObjectIdentifier, ObjectType, UnconfirmedServiceChoice,
    };

    #[test]
    fn test_layered_decode_of_iam_broadcast() {
        // Original-Broadcast-NPDU carrying an I-Am for device 123,
        // max APDU 1476, no segmentation, vendor id 260
        let frame = [
            0x81, 0x0B, 0x00, 0x19, // BVLC
            0x01, 0x20, 0xFF, 0xFF, 0x00, 0xFF, // NPDU, global broadcast
            0x10, 0x00, // unconfirmed request, I-Am
            0xC4, 0x02, 0x00, 0x00, 0x7B, // device object id
            0x22, 0x05, 0xC4, // max APDU
            0x91, 0x03, // segmentation
            0x22, 0x01, 0x04, // vendor id
        ];

        let bvlc = Bvlc::decode(&frame).unwrap();
        let npdu = bvlc.npdu().unwrap();
        assert!(npdu.destination.as_ref().unwrap().is_broadcast());

        let apdu = match &npdu.body {
            NpduBody::Application(apdu) => apdu,
            other => panic!("expected application body, got {:?}", other),
        };
        match apdu.decode_unconfirmed_service().unwrap() {
            UnconfirmedServiceRequest::IAm(iam) => {
                assert_eq!(iam.device_identifier.instance, 123);
                assert_eq!(iam.max_apdu_length_accepted, 1476);
                assert_eq!(iam.segmentation_supported, Segmentation::None);
                assert_eq!(iam.vendor_identifier, 260);
            }
            other => panic!("expected I-Am, got {:?}", other),
        }

        // Round-trip identity through every layer
        assert_eq!(bvlc.encode(), frame);
    }

    #[test]
    fn test_layered_encode_matches_handwritten_frame() {
        let mut service_data = Vec::new();
        IAmRequest::new(
            ObjectIdentifier::new(ObjectType::Device, 123),
            1476,
            Segmentation::None,
            260,
        )
        .encode(&mut service_data)
        .unwrap();

        let frame = Bvlc::OriginalBroadcastNpdu {
            npdu: Npdu::global_broadcast(Apdu::UnconfirmedRequest {
                service_choice: UnconfirmedServiceChoice::IAm,
                service_data,
            }),
        }
        .encode();

        assert_eq!(&frame[..4], &[0x81, 0x0B, 0x00, 0x19]);
        assert_eq!(Bvlc::decode(&frame).unwrap().encode(), frame);
    }

    #[test]
    fn test_util_functions() {
        let encoded = encode_object_id(8, 123).unwrap();
        let (object_type, instance) = decode_object_id(encoded);
        assert_eq!(object_type, 8);
        assert_eq!(instance, 123);
    }
}
