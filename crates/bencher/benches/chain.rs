use std::hint::black_box;

use bencher::{Payload, TestCase};
use bytes::Bytes;
use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use micro_filter::chain::FilterChain;
use micro_filter::filter::{Filter, FilterResult, PassThrough};
use micro_filter::status::{DataStatus, HeadersStatus};
use micro_stream::protocol::{Direction, Frame, HeaderMap, StreamId};

static SMALL_BODY: Payload = Payload::new(64, 4);
static LARGE_BODY: Payload = Payload::new(16 * 1024, 64);

/// Holds headers and buffers the whole body until the chain is continued.
struct Hold;

impl Filter for Hold {
    fn on_headers(&mut self, _headers: HeaderMap, _end_stream: bool) -> FilterResult<HeadersStatus> {
        Ok(HeadersStatus::StopIteration)
    }

    fn on_data(&mut self, _data: Bytes, _end_stream: bool) -> FilterResult<DataStatus> {
        Ok(DataStatus::StopIterationAndBuffer)
    }
}

fn create_test_cases() -> Vec<TestCase> {
    vec![
        TestCase::small("small_body_1_filter", 1, SMALL_BODY),
        TestCase::normal("small_body_8_filters", 8, SMALL_BODY),
        TestCase::large("large_body_8_filters", 8, LARGE_BODY),
    ]
}

fn headers() -> HeaderMap {
    HeaderMap::builder()
        .add(":method", "POST")
        .add(":scheme", "https")
        .add(":authority", "example.com")
        .add(":path", "/upload")
        .add("content-type", "application/octet-stream")
        .build()
}

fn pass_through_chain(filters: usize) -> FilterChain {
    (0..filters).fold(FilterChain::builder(Direction::Request), |builder, _| builder.add_last(PassThrough)).build(StreamId::new(1))
}

fn benchmark_pass_through(criterion: &mut Criterion) {
    let headers = headers();
    let mut group = criterion.benchmark_group("pass_through_chain");

    for case in create_test_cases() {
        group.throughput(Throughput::Bytes(case.payload().len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
            let chunk = Bytes::from(case.payload().chunk());
            let chunks = case.payload().chunks();
            b.iter_batched(
                || pass_through_chain(case.filters()),
                |mut chain| {
                    let mut sink: Vec<Frame> = Vec::with_capacity(chunks + 1);
                    chain.run_headers(headers.clone(), false, &mut sink).expect("pass through chain should not fail");
                    for n in 1..=chunks {
                        chain.run_data(chunk.clone(), n == chunks, &mut sink).expect("pass through chain should not fail");
                    }
                    black_box(sink);
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn benchmark_buffer_and_continue(criterion: &mut Criterion) {
    let headers = headers();
    let mut group = criterion.benchmark_group("buffer_and_continue");

    for case in create_test_cases() {
        group.throughput(Throughput::Bytes(case.payload().len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
            let chunk = Bytes::from(case.payload().chunk());
            let chunks = case.payload().chunks();
            b.iter_batched(
                || {
                    (0..case.filters())
                        .fold(FilterChain::builder(Direction::Request).add_last(Hold), |builder, _| builder.add_last(PassThrough))
                        .build(StreamId::new(1))
                },
                |mut chain| {
                    let mut sink: Vec<Frame> = Vec::with_capacity(2);
                    chain.run_headers(headers.clone(), false, &mut sink).expect("holding chain should not fail");
                    for n in 1..=chunks {
                        chain.run_data(chunk.clone(), n == chunks, &mut sink).expect("holding chain should not fail");
                    }
                    chain.continue_iteration(&mut sink).expect("held chain should continue");
                    black_box(sink);
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(chain, benchmark_pass_through, benchmark_buffer_and_continue);
criterion_main!(chain);
