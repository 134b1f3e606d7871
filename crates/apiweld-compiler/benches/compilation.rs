//! Bundling and proxy compilation benchmarks.
//!
//! Measures bundling a root document whose operations reference schemas in
//! a shared file, and compiling a proxy document over an upstream of the
//! same size.
//!
//! Run with: cargo bench -p apiweld-compiler --bench compilation

use std::path::Path;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use apiweld_compiler::{bundle_file, compile_proxy_file, BundleOptions, CompileOptions};

/// Shared schemas file with N schemas.
fn generate_common(schema_count: usize) -> String {
    let mut yaml = String::from(
        r#"openapi: "3.1.0"
info:
  title: Common
  version: "1.0.0"
paths: {}
components:
  schemas:
    Error:
      type: object
      properties:
        code:
          type: integer
        message:
          type: string
"#,
    );
    for i in 0..schema_count {
        yaml.push_str(&format!(
            r#"    Resource{i}:
      type: object
      properties:
        id:
          type: string
          format: uuid
        error:
          $ref: '#/components/schemas/Error'
"#,
        ));
    }
    yaml
}

/// Root document with N operations, each referencing one shared schema.
fn generate_spec(operation_count: usize) -> String {
    let mut yaml = String::from(
        r#"openapi: "3.1.0"
info:
  title: Benchmark API
  version: "1.0.0"
paths:
"#,
    );
    for i in 0..operation_count {
        yaml.push_str(&format!(
            r#"  /resource{i}/{{id}}:
    parameters:
      - name: id
        in: path
        required: true
        schema:
          type: string
    get:
      operationId: getResource{i}
      parameters:
        - name: limit
          in: query
          schema:
            type: integer
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema:
                $ref: 'common.yaml#/components/schemas/Resource{i}'
"#,
        ));
    }
    yaml
}

/// Proxy document fronting every other operation of the root document.
fn generate_proxy(operation_count: usize) -> String {
    let mut yaml = String::from(
        r#"openapi: "3.1.0"
info:
  title: Benchmark Proxy
  version: "1.0.0"
components:
  x-proxy:
    api:
      spec: api.yaml
paths:
"#,
    );
    for i in (0..operation_count).step_by(2) {
        yaml.push_str(&format!(
            r#"  /proxied{i}/{{id}}:
    get:
      operationId: proxied{i}
      x-proxy:
        name: api
        path: /resource{i}/{{id}}
        method: get
"#,
        ));
    }
    yaml
}

fn write(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

fn bench_bundling(c: &mut Criterion) {
    let mut group = c.benchmark_group("bundle");

    for op_count in [10, 50, 100] {
        let temp_dir = tempfile::TempDir::new().unwrap();
        write(temp_dir.path(), "common.yaml", &generate_common(op_count));
        write(temp_dir.path(), "api.yaml", &generate_spec(op_count));
        let spec_path = temp_dir.path().join("api.yaml");
        let options = BundleOptions::default();

        group.bench_with_input(
            BenchmarkId::new("bundle", format!("{}_ops", op_count)),
            &spec_path,
            |b, spec_path| {
                b.iter(|| black_box(bundle_file(spec_path, &options).unwrap()));
            },
        );
    }

    group.finish();
}

fn bench_proxy_compilation(c: &mut Criterion) {
    let mut group = c.benchmark_group("proxy");
    let options = CompileOptions::default();

    for op_count in [10, 50, 100] {
        let temp_dir = tempfile::TempDir::new().unwrap();
        write(temp_dir.path(), "common.yaml", &generate_common(op_count));
        write(temp_dir.path(), "api.yaml", &generate_spec(op_count));
        write(temp_dir.path(), "proxy.yaml", &generate_proxy(op_count));
        let proxy_path = temp_dir.path().join("proxy.yaml");

        group.bench_with_input(
            BenchmarkId::new("compile", format!("{}_ops", op_count)),
            &proxy_path,
            |b, proxy_path| {
                b.iter(|| black_box(compile_proxy_file(proxy_path, &options).unwrap()));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_bundling, bench_proxy_compilation);
criterion_main!(benches);
