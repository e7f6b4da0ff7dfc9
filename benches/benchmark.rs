use criterion::{criterion_group, criterion_main, Criterion};

use fmdescent::descent::{
    Consistency, DescentConfig, DescentDriver, DescentMetrics, Scoring,
};
use fmdescent::index::BiFmIndex;

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("exact_descent", |b| {
        let reference = format!(
            "{0}{1}{0}",
            "CATGTCAGCTATATAGCGCGCTCGCATCATTTTGTGTGTAAACCA",
            "N".repeat(10)
        );
        let index = BiFmIndex::new(reference.as_bytes(), 10).unwrap();
        let sc = Scoring::default();
        let conf = DescentConfig {
            cons: Consistency::Linear {
                intercept: 0.0,
                slope: 1.0,
            },
        };

        let seq = b"GCTATATAGCGCGCTCGCATCATTTTGTGT";
        let qual = b"ABCDEFGHIabcdefghiABCDEFGHIabc";

        let mut driver = DescentDriver::new();
        let mut met = DescentMetrics::default();
        b.iter(|| {
            driver.init_read(seq, qual).unwrap();
            driver.add_root(conf.clone(), 0, true, true, 0.0);
            driver.go(&sc, &index, &mut met).unwrap();
            assert_eq!(driver.sink().nrange(), 1);
        })
    });

    c.bench_function("one_mismatch_descent", |b| {
        let reference = format!(
            "{}{}{}",
            "CATGTCAGCTATATAGCGCGCTCGCATCATTTTGTGTGTAAACCA",
            "N".repeat(10),
            "CATGTCAGCTATATAGCG"
        );
        let index = BiFmIndex::new(reference.as_bytes(), 10).unwrap();
        let sc = Scoring::default();
        let conf = DescentConfig {
            cons: Consistency::Linear {
                intercept: 0.0,
                slope: 1.0,
            },
        };

        // One complemented base mid-read.
        let seq = b"GCTATATAGCGCGCTGGCATCATTTTGTGT";
        let qual = b"ABCDEFGHIabcdefghiABCDEFGHIabc";

        let mut driver = DescentDriver::new();
        let mut met = DescentMetrics::default();
        b.iter(|| {
            driver.init_read(seq, qual).unwrap();
            driver.add_root(conf.clone(), 0, true, true, 0.0);
            driver.go(&sc, &index, &mut met).unwrap();
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
