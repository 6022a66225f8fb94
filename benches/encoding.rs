use bacnet_codec::app::Apdu;
use bacnet_codec::datalink::Bvlc;
use bacnet_codec::encoding::{decode_unsigned, encode_unsigned, Tag};
use bacnet_codec::network::Npdu;
use bacnet_codec::object::{ObjectIdentifier, ObjectType, Segmentation};
use bacnet_codec::service::{IAmRequest, UnconfirmedServiceChoice};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn iam_frame() -> Vec<u8> {
    let mut service_data = Vec::new();
    IAmRequest::new(
        ObjectIdentifier::new(ObjectType::Device, 123),
        1476,
        Segmentation::None,
        260,
    )
    .encode(&mut service_data)
    .unwrap();

    Bvlc::OriginalBroadcastNpdu {
        npdu: Npdu::local(Apdu::UnconfirmedRequest {
            service_choice: UnconfirmedServiceChoice::IAm,
            service_data,
        }),
    }
    .encode()
}

fn encode_benchmark(c: &mut Criterion) {
    c.bench_function("encode_unsigned", |b| {
        let mut buffer = Vec::with_capacity(8);
        b.iter(|| {
            buffer.clear();
            encode_unsigned(&mut buffer, black_box(123_456)).unwrap();
            black_box(&buffer);
        })
    });
}

fn decode_benchmark(c: &mut Criterion) {
    let mut encoded = Vec::new();
    encode_unsigned(&mut encoded, 123_456).unwrap();

    c.bench_function("decode_unsigned", |b| {
        b.iter(|| decode_unsigned(black_box(&encoded)).unwrap())
    });

    c.bench_function("decode_tag_header", |b| {
        b.iter(|| Tag::decode(black_box(&encoded)).unwrap())
    });
}

fn frame_benchmark(c: &mut Criterion) {
    let frame = iam_frame();

    c.bench_function("decode_iam_frame", |b| {
        b.iter(|| Bvlc::decode(black_box(&frame)).unwrap())
    });

    let decoded = Bvlc::decode(&frame).unwrap();
    c.bench_function("encode_iam_frame", |b| b.iter(|| black_box(&decoded).encode()));
}

criterion_group!(benches, encode_benchmark, decode_benchmark, frame_benchmark);
criterion_main!(benches);
