//! End-to-end tests through wasmtime.
//!
//! Every module the compiler accepts must validate and instantiate in a
//! conforming runtime, and the exported functions must compute the right
//! values when called.

use tarn_core::compile;
use wasmtime::{Engine, Instance, Linker, Module, Store};

fn instantiate(source: &str) -> (Store<()>, Instance) {
    let bytes = compile(source).expect("compilation failed");
    let engine = Engine::default();
    let module = Module::new(&engine, &bytes).expect("module failed validation");
    let mut store = Store::new(&engine, ());
    let instance = Instance::new(&mut store, &module, &[]).expect("instantiation failed");
    (store, instance)
}

#[test]
fn test_add() {
    let (mut store, instance) = instantiate("(fn add ((a i32) (b i32)) i32 (+ a b)) (export add)");
    let add = instance
        .get_typed_func::<(i32, i32), i32>(&mut store, "add")
        .unwrap();
    assert_eq!(add.call(&mut store, (2, 3)).unwrap(), 5);
    assert_eq!(add.call(&mut store, (-7, 7)).unwrap(), 0);
}

#[test]
fn test_factorial_loop() {
    let source = "(fn factorial ((n i32)) i32 \
                    (var r i32 1) \
                    (var i i32 1) \
                    (while (<= i n) (set r (* r i)) (set i (+ i 1))) \
                    r) \
                  (export factorial)";
    let (mut store, instance) = instantiate(source);
    let factorial = instance
        .get_typed_func::<i32, i32>(&mut store, "factorial")
        .unwrap();
    assert_eq!(factorial.call(&mut store, 0).unwrap(), 1);
    assert_eq!(factorial.call(&mut store, 5).unwrap(), 120);
    assert_eq!(factorial.call(&mut store, 10).unwrap(), 3628800);
}

#[test]
fn test_abs_if_expression() {
    let (mut store, instance) =
        instantiate("(fn abs ((x i32)) i32 (if (< x 0) (- 0 x) x)) (export abs)");
    let abs = instance.get_typed_func::<i32, i32>(&mut store, "abs").unwrap();
    assert_eq!(abs.call(&mut store, -5).unwrap(), 5);
    assert_eq!(abs.call(&mut store, 0).unwrap(), 0);
    assert_eq!(abs.call(&mut store, 7).unwrap(), 7);
}

#[test]
fn test_fib_recursion() {
    let source =
        "(fn fib ((n i32)) i32 (if (< n 2) n (+ (fib (- n 1)) (fib (- n 2))))) (export fib)";
    let (mut store, instance) = instantiate(source);
    let fib = instance.get_typed_func::<i32, i32>(&mut store, "fib").unwrap();
    assert_eq!(fib.call(&mut store, 10).unwrap(), 55);
    assert_eq!(fib.call(&mut store, 1).unwrap(), 1);
}

#[test]
fn test_echo_through_memory() {
    let source = "(fn echo ((p i32) (n i32)) i32 \
                    (var o i32 0x20000) \
                    (store i32 o n) \
                    (var i i32 0) \
                    (while (< i n) \
                      (store i32 (+ (+ o 4) i) (load i32 (+ p i))) \
                      (set i (+ i 1))) \
                    o) \
                  (export echo) (export memory)";
    let (mut store, instance) = instantiate(source);
    let memory = instance
        .get_memory(&mut store, "memory")
        .expect("memory is exported");

    // The module declares a single initial page; grow to cover the input
    // region at 0x10000 and the output region at 0x20000.
    memory.grow(&mut store, 3).unwrap();
    memory.write(&mut store, 0x10000, b"hello").unwrap();

    let echo = instance
        .get_typed_func::<(i32, i32), i32>(&mut store, "echo")
        .unwrap();
    let out = echo.call(&mut store, (0x10000, 5)).unwrap() as usize;
    assert_eq!(out, 0x20000);

    let mut len = [0u8; 4];
    memory.read(&store, out, &mut len).unwrap();
    assert_eq!(u32::from_le_bytes(len), 5);

    let mut payload = [0u8; 5];
    memory.read(&store, out + 4, &mut payload).unwrap();
    assert_eq!(&payload, b"hello");
}

#[test]
fn test_duplicate_definition_fails() {
    let err = compile("(fn a () i32 0) (fn a () i32 1)").unwrap_err();
    assert_eq!(err.kind_name(), "DuplicateDefinition");
}

#[test]
fn test_unknown_callee_fails() {
    let err = compile("(fn a () i32 (b))").unwrap_err();
    assert_eq!(err.kind_name(), "UndefinedFunction");
}

#[test]
fn test_imported_functions_are_callable() {
    let bytes = compile(
        "(import env bump ((x i32)) i32) \
         (fn twice ((x i32)) i32 (bump (bump x))) \
         (export twice)",
    )
    .unwrap();

    let engine = Engine::default();
    let module = Module::new(&engine, &bytes).unwrap();
    let mut linker = Linker::new(&engine);
    linker.func_wrap("env", "bump", |x: i32| x + 1).unwrap();
    let mut store = Store::new(&engine, ());
    let instance = linker.instantiate(&mut store, &module).unwrap();

    let twice = instance
        .get_typed_func::<i32, i32>(&mut store, "twice")
        .unwrap();
    assert_eq!(twice.call(&mut store, 5).unwrap(), 7);
}

#[test]
fn test_i64_arithmetic_through_params() {
    let source = "(fn mulsum ((a i64) (b i64)) i64 (+ (* a b) b)) (export mulsum)";
    let (mut store, instance) = instantiate(source);
    let mulsum = instance
        .get_typed_func::<(i64, i64), i64>(&mut store, "mulsum")
        .unwrap();
    assert_eq!(
        mulsum.call(&mut store, (3_000_000_000, 2)).unwrap(),
        6_000_000_002
    );
}

#[test]
fn test_f64_literals_and_division() {
    let source = "(fn mean ((a f64) (b f64)) f64 (/ (+ a b) 2.0)) (export mean)";
    let (mut store, instance) = instantiate(source);
    let mean = instance
        .get_typed_func::<(f64, f64), f64>(&mut store, "mean")
        .unwrap();
    assert_eq!(mean.call(&mut store, (1.0, 4.0)).unwrap(), 2.5);
}

#[test]
fn test_f32_loads_and_stores() {
    let source = "(fn put ((addr i32) (v f32)) void (store f32 addr v)) \
                  (fn get ((addr i32)) f32 (load f32 addr)) \
                  (export put) (export get)";
    let (mut store, instance) = instantiate(source);
    let put = instance
        .get_typed_func::<(i32, f32), ()>(&mut store, "put")
        .unwrap();
    let get = instance
        .get_typed_func::<i32, f32>(&mut store, "get")
        .unwrap();

    put.call(&mut store, (64, 1.5)).unwrap();
    assert_eq!(get.call(&mut store, 64).unwrap(), 1.5);
}

#[test]
fn test_void_function_with_dropped_values() {
    let source = "(fn tick ((n i32)) void (block (+ n 1) (* n 2)) (if (> n 0) n)) \
                  (export tick)";
    let (mut store, instance) = instantiate(source);
    let tick = instance.get_typed_func::<i32, ()>(&mut store, "tick").unwrap();
    tick.call(&mut store, 3).unwrap();
}

#[test]
fn test_signed_operator_semantics() {
    let source = "(fn f ((a i32) (b i32)) i32 (/ a b)) \
                  (fn g ((a i32) (b i32)) i32 (% a b)) \
                  (fn h ((a i32) (b i32)) i32 (shr a b)) \
                  (export f) (export g) (export h)";
    let (mut store, instance) = instantiate(source);
    let div = instance
        .get_typed_func::<(i32, i32), i32>(&mut store, "f")
        .unwrap();
    let rem = instance
        .get_typed_func::<(i32, i32), i32>(&mut store, "g")
        .unwrap();
    let shr = instance
        .get_typed_func::<(i32, i32), i32>(&mut store, "h")
        .unwrap();

    assert_eq!(div.call(&mut store, (-7, 2)).unwrap(), -3);
    assert_eq!(rem.call(&mut store, (-7, 2)).unwrap(), -1);
    assert_eq!(shr.call(&mut store, (-8, 1)).unwrap(), -4);
}

#[test]
fn test_bitwise_and_shift_operators() {
    let source = "(fn f ((a i32) (b i32)) i32 (xor (and a b) (or a b))) \
                  (fn g ((a i32)) i32 (shl a 4)) \
                  (export f) (export g)";
    let (mut store, instance) = instantiate(source);
    let f = instance
        .get_typed_func::<(i32, i32), i32>(&mut store, "f")
        .unwrap();
    let g = instance.get_typed_func::<i32, i32>(&mut store, "g").unwrap();

    assert_eq!(f.call(&mut store, (0b1100, 0b1010)).unwrap(), 0b0110);
    assert_eq!(g.call(&mut store, 3).unwrap(), 48);
}

#[test]
fn test_nested_control_flow_validates() {
    // Locals declared inside nested conditionals and loops, values
    // dropped at every block level.
    let source = "(fn collatz ((n i32)) i32 \
                    (var steps i32 0) \
                    (while (> n 1) \
                      (if (== (% n 2) 0) \
                        (set n (/ n 2)) \
                        (set n (+ (* 3 n) 1))) \
                      (set steps (+ steps 1))) \
                    steps) \
                  (export collatz)";
    let (mut store, instance) = instantiate(source);
    let collatz = instance
        .get_typed_func::<i32, i32>(&mut store, "collatz")
        .unwrap();
    assert_eq!(collatz.call(&mut store, 6).unwrap(), 8);
    assert_eq!(collatz.call(&mut store, 1).unwrap(), 0);
}
