use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use iac_scan::fs::OsFilesystem;
use iac_scan::scanner::Scanner;

fn write_kubernetes_manifest(path: &Path, name: &str) {
    let content = format!("apiVersion: v1\nkind: Pod\nmetadata:\n  name: {name}\n");
    fs::write(path, content).unwrap();
}

fn write_terraform_config(path: &Path) {
    fs::write(path, "resource \"aws_s3_bucket\" \"b\" {\n  bucket = \"b\"\n}\n").unwrap();
}

fn setup_flat_tree(count: usize) -> TempDir {
    let dir = TempDir::new().unwrap();

    for i in 0..count {
        write_kubernetes_manifest(&dir.path().join(format!("pod_{i}.yaml")), &format!("app-{i}"));
    }

    dir
}

fn setup_nested_tree(modules: usize) -> TempDir {
    let dir = TempDir::new().unwrap();

    for i in 0..modules {
        let module_dir = dir.path().join(format!("module_{i}"));
        fs::create_dir_all(&module_dir).unwrap();
        write_terraform_config(&module_dir.join("main.tf"));
        write_kubernetes_manifest(&module_dir.join("deploy.yaml"), &format!("svc-{i}"));
    }

    dir
}

fn bench_flat_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan_flat");

    for count in [10, 100, 500] {
        let dir = setup_flat_tree(count);
        let scanner = Scanner::new(Arc::new(OsFilesystem));
        let paths = vec![dir.path().to_path_buf()];

        group.bench_with_input(BenchmarkId::from_parameter(count), &paths, |b, paths| {
            b.iter(|| {
                let report = scanner.scan(black_box(paths));
                black_box(report.loader.count())
            })
        });
    }

    group.finish();
}

fn bench_nested_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan_nested");

    for modules in [10, 50] {
        let dir = setup_nested_tree(modules);
        let scanner = Scanner::new(Arc::new(OsFilesystem));
        let paths = vec![dir.path().to_path_buf()];

        group.bench_with_input(BenchmarkId::from_parameter(modules), &paths, |b, paths| {
            b.iter(|| {
                let report = scanner.scan(black_box(paths));
                black_box(report.loader.count())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_flat_scan, bench_nested_scan);
criterion_main!(benches);
