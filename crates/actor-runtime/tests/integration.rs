// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: graph construction → compilation → actor execution.
//!
//! These tests drive whole graphs through the engine and check the
//! scheduler's guarantees: each actor runs once per run, buffers are
//! released exactly once, call sites do not share state, and a failing
//! kernel aborts the run with its own status.

use actor_runtime::{
    DispatchPolicy, Engine, Kernel, KernelError, KernelHooks, KernelRegistry, Ready,
    RuntimeConfig, RuntimeError, StatusCode,
};
use graph_ir::{GraphBuilder, GraphLoader, KernelGraph, NodeDef, TensorDef, Validated};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tensor_core::{Category, DType, Format, Shape, Tensor};

// ── Helpers ────────────────────────────────────────────────────

fn config(dispatch: DispatchPolicy) -> RuntimeConfig {
    RuntimeConfig {
        num_threads: Some(4),
        dispatch,
        memory_budget: "16M".to_string(),
        ..RuntimeConfig::default()
    }
}

fn ready_with(
    graph: &KernelGraph<Validated>,
    dispatch: DispatchPolicy,
    registry: &KernelRegistry,
) -> Engine<Ready> {
    Engine::new(config(dispatch))
        .compile(graph)
        .expect("compile")
        .prepare(registry)
        .expect("prepare")
}

fn ready(graph: &KernelGraph<Validated>) -> Engine<Ready> {
    ready_with(graph, DispatchPolicy::Inline, &KernelRegistry::with_builtins())
}

fn f32s(name: &str, values: &[f32]) -> Tensor {
    Tensor::from_values(name, Shape::vector(values.len()), values).unwrap()
}

/// `n` nodes of `op` in a row over a `[len]` f32 tensor.
fn chain(n: usize, op: impl Fn(usize) -> &'static str, len: i64) -> KernelGraph<Validated> {
    let mut b = GraphBuilder::new("chain");
    let mut cur = b.input("x", DType::F32, &[len]);
    for i in 0..n {
        let next = b.var(format!("t{i}"), DType::F32, &[len]);
        b.op(format!("n{i}"), op(i), vec![cur], vec![next]);
        cur = next;
    }
    b.output(cur);
    b.build().validate().unwrap()
}

/// x ─identity─▶ a ─┐
///                   ├─add─▶ y
/// x ─scale(2)─▶ b ─┘
fn diamond() -> KernelGraph<Validated> {
    let mut b = GraphBuilder::new("diamond");
    let x = b.input("x", DType::F32, &[3]);
    let a = b.var("a", DType::F32, &[3]);
    let d = b.var("b", DType::F32, &[3]);
    let y = b.var("y", DType::F32, &[3]);
    b.op("left", "identity", vec![x], vec![a]);
    b.node(0, NodeDef::new("right", "scale", vec![x], vec![d]).with_attr("factor", 2.0));
    b.op("join", "add", vec![a, d], vec![y]);
    b.output(y);
    b.build().validate().unwrap()
}

/// Counts kernel executions per node name.
fn counting_hooks() -> (KernelHooks, Arc<Mutex<HashMap<String, usize>>>) {
    let counts = Arc::new(Mutex::new(HashMap::new()));
    let sink = Arc::clone(&counts);
    let hooks = KernelHooks::new().with_before(move |info, _inputs| {
        *sink.lock().unwrap().entry(info.node_name.clone()).or_insert(0) += 1;
        true
    });
    (hooks, counts)
}

#[derive(Debug)]
struct Fail;

impl Kernel for Fail {
    fn execute(&mut self, _inputs: &[Tensor], _outputs: &mut [Tensor]) -> Result<(), KernelError> {
        Err(KernelError::new(StatusCode::OpExecuteFailure, "injected failure"))
    }
}

/// Panics on its first execution, then behaves like `identity`.
#[derive(Debug, Default)]
struct PanicOnce {
    fired: bool,
}

impl Kernel for PanicOnce {
    fn execute(&mut self, inputs: &[Tensor], outputs: &mut [Tensor]) -> Result<(), KernelError> {
        if !self.fired {
            self.fired = true;
            panic!("kernel state corrupted");
        }
        outputs[0].bytes_mut()?.copy_from_slice(inputs[0].bytes()?);
        Ok(())
    }
}

// ── Execution ──────────────────────────────────────────────────

#[tokio::test]
async fn test_identity_chain_round_trip() {
    let engine = ready(&chain(8, |_| "identity", 4));
    let out = engine.run(vec![f32s("x", &[1.0, -2.0, 3.5, 0.0])]).await.unwrap();
    assert_eq!(out.outputs[0].name(), "t7");
    assert_eq!(out.outputs[0].to_vec::<f32>().unwrap(), vec![1.0, -2.0, 3.5, 0.0]);
    assert_eq!(out.metrics.actors_executed, 8);
}

#[tokio::test]
async fn test_each_actor_executes_once_per_run() {
    let engine = ready(&diamond());
    let (hooks, counts) = counting_hooks();

    for run in 1..=3 {
        let out = engine
            .run_with_hooks(vec![f32s("x", &[1.0, 2.0, 3.0])], hooks.clone())
            .await
            .unwrap();
        assert_eq!(out.outputs[0].to_vec::<f32>().unwrap(), vec![3.0, 6.0, 9.0]);
        let counts = counts.lock().unwrap();
        for name in ["left", "right", "join"] {
            assert_eq!(counts[name], run, "actor '{name}' after run {run}");
        }
    }
}

#[tokio::test]
async fn test_same_tensor_on_two_slots() {
    let mut b = GraphBuilder::new("square-ish");
    let x = b.input("x", DType::F32, &[2]);
    let t = b.var("t", DType::F32, &[2]);
    let y = b.var("y", DType::F32, &[2]);
    b.op("copy", "identity", vec![x], vec![t]);
    b.op("double", "add", vec![t, t], vec![y]);
    b.output(y);
    let graph = b.build().validate().unwrap();

    let engine = ready(&graph);
    assert_eq!(engine.compiled().num_arrows(), 2);
    let out = engine.run(vec![f32s("x", &[1.5, -1.0])]).await.unwrap();
    assert_eq!(out.outputs[0].to_vec::<f32>().unwrap(), vec![3.0, -2.0]);
}

#[tokio::test]
async fn test_queued_dispatch() {
    let engine = ready_with(&diamond(), DispatchPolicy::Queued, &KernelRegistry::with_builtins());
    let (hooks, counts) = counting_hooks();
    for _ in 0..5 {
        let out = engine
            .run_with_hooks(vec![f32s("x", &[0.5, 1.0, 1.5])], hooks.clone())
            .await
            .unwrap();
        assert_eq!(out.outputs[0].to_vec::<f32>().unwrap(), vec![1.5, 3.0, 4.5]);
    }
    assert!(counts.lock().unwrap().values().all(|&c| c == 5));
}

#[tokio::test]
async fn test_sequential_runs_on_shared_engine() {
    let engine = Arc::new(ready(&chain(3, |_| "identity", 1)));
    let a = {
        let engine = Arc::clone(&engine);
        async move { engine.run(vec![f32s("x", &[1.0])]).await }
    };
    let b = {
        let engine = Arc::clone(&engine);
        async move { engine.run(vec![f32s("x", &[2.0])]).await }
    };
    let (a, b) = tokio::join!(a, b);
    assert_eq!(a.unwrap().outputs[0].to_vec::<f32>().unwrap(), vec![1.0]);
    assert_eq!(b.unwrap().outputs[0].to_vec::<f32>().unwrap(), vec![2.0]);
}

// ── Memory ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_buffers_released_exactly_once() {
    let mut b = GraphBuilder::new("fanout");
    let x = b.input("x", DType::F32, &[64]);
    let t = b.var("t", DType::F32, &[64]);
    let u = b.var("u", DType::F32, &[64]);
    let v = b.var("v", DType::F32, &[64]);
    let y = b.var("y", DType::F32, &[64]);
    b.op("src", "identity", vec![x], vec![t]);
    b.op("l", "identity", vec![t], vec![u]);
    b.op("r", "identity", vec![t], vec![v]);
    b.op("sum", "add", vec![u, v], vec![y]);
    b.output(y);
    let engine = ready(&b.build().validate().unwrap());

    let input: Vec<f32> = (0..64).map(|i| i as f32).collect();
    let out = engine.run(vec![f32s("x", &input)]).await.unwrap();
    let expected: Vec<f32> = input.iter().map(|v| v * 2.0).collect();
    assert_eq!(out.outputs[0].to_vec::<f32>().unwrap(), expected);

    // Only the returned output is still live.
    assert_eq!(engine.memory_stats().live_buffers(), 1);
    drop(out);
    assert_eq!(engine.memory_stats().live_buffers(), 0);
}

#[tokio::test]
async fn test_repeated_runs_reuse_pool() {
    let engine = ready(&chain(10, |_| "identity", 256));
    let input: Vec<f32> = (0..256).map(|i| i as f32 * 0.5).collect();

    drop(engine.run(vec![f32s("x", &input)]).await.unwrap());
    let after_first = engine.memory_stats();
    assert_eq!(after_first.live_buffers(), 0);

    for _ in 0..20 {
        let out = engine.run(vec![f32s("x", &input)]).await.unwrap();
        assert_eq!(out.outputs[0].to_vec::<f32>().unwrap(), input);
    }
    let after_all = engine.memory_stats();
    assert_eq!(after_all.cache_misses, after_first.cache_misses);
    assert_eq!(after_all.live_buffers(), 0);
    assert!(after_all.cache_hits > after_first.cache_hits);
}

// ── Type conversion ────────────────────────────────────────────

#[tokio::test]
async fn test_int_producer_cast_float_consumer() {
    let mut b = GraphBuilder::new("cast");
    let x = b.input("x", DType::I32, &[3]);
    let p = b.var("p", DType::I32, &[3]);
    let q = b.var("q", DType::F32, &[3]);
    let y = b.var("y", DType::F32, &[3]);
    b.op("producer", "identity", vec![x], vec![p]);
    b.node(0, NodeDef::new("cast", "cast", vec![p], vec![q]).with_attr("to", "f32"));
    b.node(0, NodeDef::new("consumer", "scale", vec![q], vec![y]).with_attr("factor", 0.5));
    b.output(y);
    let engine = ready(&b.build().validate().unwrap());

    let x = Tensor::from_values("x", Shape::vector(3), &[2i32, -4, 7]).unwrap();
    let out = engine.run(vec![x]).await.unwrap();
    assert_eq!(out.outputs[0].dtype(), DType::F32);
    assert_eq!(out.outputs[0].to_vec::<f32>().unwrap(), vec![1.0, -2.0, 3.5]);
}

#[tokio::test]
async fn test_call_argument_converted_to_parameter_dtype() {
    let mut b = GraphBuilder::new("call-cast");
    let x = b.input("x", DType::I32, &[2]);
    let y = b.input("y", DType::F32, &[2]);
    let f = b.var("f", DType::F32, &[]);
    let z = b.var("z", DType::F32, &[2]);

    let body = b.subgraph("body");
    let k = b.var("k", DType::F32, &[2]);
    let a = b.var("a", DType::F32, &[2]);
    let out = b.var("out", DType::F32, &[2]);
    b.node(body, NodeDef::new("add", "add", vec![k, a], vec![out]));
    b.bind_subgraph(body, vec![k, a], vec![out]);

    b.node(0, NodeDef::partial("p", body, vec![x], f));
    b.node(0, NodeDef::call("c", f, vec![y], vec![z]));
    b.output(z);
    let engine = ready(&b.build().validate().unwrap());

    let x = Tensor::from_values("x", Shape::vector(2), &[3i32, 4]).unwrap();
    let out = engine.run(vec![x, f32s("y", &[0.5, 0.25])]).await.unwrap();
    assert_eq!(out.get("z").unwrap().to_vec::<f32>().unwrap(), vec![3.5, 4.25]);
}

#[tokio::test]
async fn test_call_argument_converted_to_parameter_layout() {
    let mut b = GraphBuilder::new("call-layout");
    let x = b.input("x", DType::F32, &[1, 1, 2, 3]);
    let f = b.var("f", DType::F32, &[]);
    let z = b.var("z", DType::F32, &[1, 3, 1, 2]);

    let nchw = |name: &str| {
        TensorDef::new(name, DType::F32, Shape::new(vec![1, 3, 1, 2]), Category::Var)
            .with_format(Format::Nchw)
    };
    let body = b.subgraph("body");
    let k = b.add_tensor(nchw("k"));
    let out = b.add_tensor(nchw("out"));
    b.node(body, NodeDef::new("copy", "identity", vec![k], vec![out]));
    b.bind_subgraph(body, vec![k], vec![out]);

    b.node(0, NodeDef::partial("p", body, vec![x], f));
    b.node(0, NodeDef::call("c", f, vec![], vec![z]));
    b.output(z);
    b.output(x);
    let engine = ready(&b.build().validate().unwrap());

    // N=1, H=1, W=2, C=3: pixels (0,1,2) and (3,4,5).
    let values: Vec<f32> = (0..6).map(|v| v as f32).collect();
    let x = Tensor::from_values("x", Shape::new(vec![1, 1, 2, 3]), &values).unwrap();
    let out = engine.run(vec![x]).await.unwrap();

    let z = out.get("z").unwrap();
    assert_eq!(z.format(), Format::Nchw);
    assert_eq!(z.shape(), &Shape::new(vec![1, 3, 1, 2]));
    assert_eq!(z.to_vec::<f32>().unwrap(), vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
    // The caller's NHWC tensor is left as it was.
    assert_eq!(out.get("x").unwrap().to_vec::<f32>().unwrap(), values);
}

// ── Tensor lists ───────────────────────────────────────────────

fn list_def(name: &str, dtype: DType) -> TensorDef {
    TensorDef::new(name, dtype, Shape::vector(2), Category::Var).with_list()
}

#[tokio::test]
async fn test_tensor_list_flows_between_actors() {
    let mut b = GraphBuilder::new("list");
    let a = b.input("a", DType::F32, &[2]);
    let c = b.input("c", DType::F32, &[2]);
    let l = b.add_tensor(list_def("l", DType::F32));
    let y = b.var("y", DType::F32, &[2]);
    b.op("pack", "list_pack", vec![a, c], vec![l]);
    b.op("sum", "list_sum", vec![l], vec![y]);
    b.output(y);
    let engine = ready(&b.build().validate().unwrap());

    for base in [0.0f32, 10.0] {
        let out = engine
            .run(vec![f32s("a", &[base + 1.0, 2.0]), f32s("c", &[3.0, base])])
            .await
            .unwrap();
        assert_eq!(out.get("y").unwrap().to_vec::<f32>().unwrap(), vec![base + 4.0, 2.0 + base]);
    }
    // Every element copy went back to the pool with its list.
    assert_eq!(engine.memory_stats().live_buffers(), 0);
}

#[tokio::test]
async fn test_call_argument_list_converted_per_element() {
    let mut b = GraphBuilder::new("list-call");
    let a = b.input("a", DType::I32, &[2]);
    let c = b.input("c", DType::I32, &[2]);
    let l = b.add_tensor(list_def("l", DType::I32));
    let f = b.var("f", DType::F32, &[]);
    let z = b.var("z", DType::F32, &[2]);

    let body = b.subgraph("reduce");
    let k = b.add_tensor(list_def("k", DType::F32));
    let out = b.var("out", DType::F32, &[2]);
    b.node(body, NodeDef::new("sum", "list_sum", vec![k], vec![out]));
    b.bind_subgraph(body, vec![k], vec![out]);

    b.op("pack", "list_pack", vec![a, c], vec![l]);
    b.node(0, NodeDef::partial("p", body, vec![], f));
    b.node(0, NodeDef::call("call", f, vec![l], vec![z]));
    b.output(z);
    let engine = ready(&b.build().validate().unwrap());

    let ints = |name: &str, v: [i32; 2]| Tensor::from_values(name, Shape::vector(2), &v).unwrap();
    let out = engine.run(vec![ints("a", [3, -4]), ints("c", [5, 6])]).await.unwrap();
    assert_eq!(out.get("z").unwrap().to_vec::<f32>().unwrap(), vec![8.0, 2.0]);
    drop(out);
    assert_eq!(engine.memory_stats().live_buffers(), 0);
}

// ── Subgraph calls ─────────────────────────────────────────────

#[tokio::test]
async fn test_call_sites_do_not_share_state() {
    let mut b = GraphBuilder::new("two-calls");
    let xa = b.input("a", DType::F32, &[2]);
    let xb = b.input("b", DType::F32, &[2]);
    let one = b.constant("one", &[2], &[1.0f32, 1.0]);
    let fa = b.var("fa", DType::F32, &[]);
    let fb = b.var("fb", DType::F32, &[]);
    let za = b.var("za", DType::F32, &[2]);
    let zb = b.var("zb", DType::F32, &[2]);

    let body = b.subgraph("inc");
    let k = b.var("k", DType::F32, &[2]);
    let a = b.var("arg", DType::F32, &[2]);
    let out = b.var("out", DType::F32, &[2]);
    b.node(body, NodeDef::new("add", "add", vec![k, a], vec![out]));
    b.bind_subgraph(body, vec![k, a], vec![out]);

    b.node(0, NodeDef::partial("pa", body, vec![xa], fa));
    b.node(0, NodeDef::partial("pb", body, vec![xb], fb));
    b.node(0, NodeDef::call("ca", fa, vec![one], vec![za]));
    b.node(0, NodeDef::call("cb", fb, vec![one], vec![zb]));
    b.output(za);
    b.output(zb);
    let engine = ready(&b.build().validate().unwrap());
    assert_eq!(engine.compiled().actors.len(), 2);

    for i in 0..10 {
        let base = i as f32;
        let out = engine
            .run(vec![f32s("a", &[base, base + 1.0]), f32s("b", &[-base, 100.0])])
            .await
            .unwrap();
        assert_eq!(out.get("za").unwrap().to_vec::<f32>().unwrap(), vec![base + 1.0, base + 2.0]);
        assert_eq!(out.get("zb").unwrap().to_vec::<f32>().unwrap(), vec![1.0 - base, 101.0]);
    }
}

#[tokio::test]
async fn test_caller_input_not_modified_by_call() {
    let mut b = GraphBuilder::new("isolated");
    let x = b.input("x", DType::F32, &[2]);
    let f = b.var("f", DType::F32, &[]);
    let z = b.var("z", DType::F32, &[2]);

    let body = b.subgraph("triple");
    let k = b.var("k", DType::F32, &[2]);
    let out = b.var("out", DType::F32, &[2]);
    b.node(body, NodeDef::new("s", "scale", vec![k], vec![out]).with_attr("factor", 3.0));
    b.bind_subgraph(body, vec![k], vec![out]);

    b.node(0, NodeDef::partial("p", body, vec![x], f));
    b.node(0, NodeDef::call("c", f, vec![], vec![z]));
    b.output(z);
    b.output(x);
    let engine = ready(&b.build().validate().unwrap());

    let out = engine.run(vec![f32s("x", &[1.0, 2.0])]).await.unwrap();
    assert_eq!(out.get("z").unwrap().to_vec::<f32>().unwrap(), vec![3.0, 6.0]);
    assert_eq!(out.get("x").unwrap().to_vec::<f32>().unwrap(), vec![1.0, 2.0]);
}

// ── Failure ────────────────────────────────────────────────────

/// Runs a five-node chain whose middle node fails, twice, and checks that
/// downstream actors never run and every buffer is returned.
async fn assert_failure_aborts_run(dispatch: DispatchPolicy) {
    let mut registry = KernelRegistry::with_builtins();
    registry.register("fail", |_| Ok(Box::new(Fail)));
    let graph = chain(5, |i| if i == 2 { "fail" } else { "identity" }, 2);
    let engine = ready_with(&graph, dispatch, &registry);
    let (hooks, counts) = counting_hooks();

    for _ in 0..2 {
        let err = engine
            .run_with_hooks(vec![f32s("x", &[1.0, 2.0])], hooks.clone())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::OpExecuteFailure);
        assert!(matches!(err, RuntimeError::Kernel { ref actor, .. } if actor == "n2"));
    }

    let counts = counts.lock().unwrap();
    assert_eq!(counts.get("n1"), Some(&2));
    assert_eq!(counts.get("n2"), Some(&2));
    assert_eq!(counts.get("n3"), None);
    assert_eq!(counts.get("n4"), None);
    drop(counts);
    assert_eq!(engine.memory_stats().live_buffers(), 0);
}

#[tokio::test]
async fn test_kernel_failure_aborts_run() {
    assert_failure_aborts_run(DispatchPolicy::Inline).await;
}

#[tokio::test]
async fn test_queued_kernel_failure_aborts_run() {
    assert_failure_aborts_run(DispatchPolicy::Queued).await;
}

#[tokio::test]
async fn test_kernel_panic_fails_run_without_hanging() {
    for dispatch in [DispatchPolicy::Inline, DispatchPolicy::Queued] {
        let mut registry = KernelRegistry::with_builtins();
        registry.register("panic_once", |_| Ok(Box::new(PanicOnce::default())));
        let graph = chain(3, |i| if i == 1 { "panic_once" } else { "identity" }, 2);
        let engine = ready_with(&graph, dispatch, &registry);

        let limit = Duration::from_secs(5);
        let err = tokio::time::timeout(limit, engine.run(vec![f32s("x", &[1.0, 2.0])]))
            .await
            .expect("run hung after a kernel panic")
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::OpExecuteFailure);
        assert!(matches!(err, RuntimeError::Kernel { ref actor, .. } if actor == "n1"));
        assert!(err.to_string().contains("kernel state corrupted"));

        // The actor survived the panic and serves the next run.
        let out = tokio::time::timeout(limit, engine.run(vec![f32s("x", &[3.0, 4.0])]))
            .await
            .expect("second run hung")
            .unwrap();
        assert_eq!(out.outputs[0].to_vec::<f32>().unwrap(), vec![3.0, 4.0]);
        drop(out);
        assert_eq!(engine.memory_stats().live_buffers(), 0);
    }
}

#[tokio::test]
async fn test_invalid_input_rejected_before_dispatch() {
    let engine = ready(&diamond());
    let (hooks, counts) = counting_hooks();
    let err = engine
        .run_with_hooks(vec![f32s("x", &[1.0, 2.0])], hooks)
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::InputParamInvalid);
    assert!(counts.lock().unwrap().is_empty());
}

// ── Loading ────────────────────────────────────────────────────

#[tokio::test]
async fn test_sample_graphs_load_and_run() {
    let root = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../graphs");

    let chain = GraphLoader::load(&root.join("chain.json")).unwrap();
    let engine = ready(&chain);
    let out = engine.run(vec![f32s("x", &[1.0, 2.0, 3.0, 4.0])]).await.unwrap();
    assert_eq!(out.get("y").unwrap().to_vec::<f32>().unwrap(), vec![3.0, 5.0, 7.0, 9.0]);

    let call = GraphLoader::load(&root.join("call.json")).unwrap();
    let engine = ready(&call);
    let out = engine
        .run(vec![f32s("x", &[1.0, 2.0]), f32s("y", &[10.0, 20.0])])
        .await
        .unwrap();
    assert_eq!(out.get("z0").unwrap().to_vec::<f32>().unwrap(), vec![11.0, 22.0]);
    assert_eq!(out.get("z1").unwrap().to_vec::<f32>().unwrap(), vec![12.0, 24.0]);
}

#[tokio::test]
async fn test_engine_load_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.json");
    std::fs::write(
        &path,
        r#"{
            "name": "inc",
            "tensors": [
                { "name": "x", "dtype": "f32", "shape": [2], "category": "graph_input" },
                { "name": "y", "dtype": "f32", "shape": [2], "category": "graph_output" }
            ],
            "subgraphs": [
                { "name": "main", "inputs": ["x"], "outputs": ["y"], "nodes": [
                    { "name": "inc", "op": "add_scalar", "inputs": ["x"], "outputs": ["y"],
                      "attrs": { "value": 1.0 } }
                ] }
            ]
        }"#,
    )
    .unwrap();

    let engine = Engine::new(RuntimeConfig {
        graph_path: path,
        ..config(DispatchPolicy::Inline)
    })
    .load()
    .unwrap()
    .prepare(&KernelRegistry::with_builtins())
    .unwrap();
    let out = engine.run(vec![f32s("x", &[1.0, 2.0])]).await.unwrap();
    assert_eq!(out.get("y").unwrap().to_vec::<f32>().unwrap(), vec![2.0, 3.0]);
    let stats = engine.terminate();
    assert!(stats.total_allocations >= 1);
}
