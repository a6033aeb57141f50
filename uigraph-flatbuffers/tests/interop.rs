//! Buffers must match the reference `flatbuffers` builder byte for byte, and each side must be
//! able to read what the other wrote.

#![allow(clippy::unwrap_used)]

use flatbuffers::FlatBufferBuilder;
use uigraph_flatbuffers::graph::{
    DType, IntPair, IntPairArgs, UiVariable, UiVariableArgs, VarType, root_as_ui_variable,
};
use uigraph_flatbuffers::{BuilderOptions, Offset, Slot, Table, TableBuilder, TableMarker, root};

fn reference_conv1_kernel() -> Vec<u8> {
    let mut fbb = FlatBufferBuilder::new();
    let name = fbb.create_string("conv1/kernel");
    let shape = fbb.create_vector(&[3i64, 3, 64, 128]);
    let init_op = fbb.create_string("init_op");
    let control_deps = fbb.create_vector(&[init_op]);
    let output_of_op = fbb.create_string("conv1/kernel/read");

    let start = fbb.start_table();
    fbb.push_slot_always(UiVariable::VT_OUTPUT_OF_OP.voffset(), output_of_op);
    fbb.push_slot_always(UiVariable::VT_CONTROL_DEPS.voffset(), control_deps);
    fbb.push_slot_always(UiVariable::VT_SHAPE.voffset(), shape);
    fbb.push_slot_always(UiVariable::VT_NAME.voffset(), name);
    fbb.push_slot::<i8>(UiVariable::VT_DATATYPE.voffset(), 3, 0);
    fbb.push_slot::<i8>(UiVariable::VT_TYPE.voffset(), 2, 0);
    let root = fbb.end_table(start);
    fbb.finish_minimal(root);
    fbb.finished_data().to_vec()
}

fn conv1_kernel() -> Vec<u8> {
    let mut fbb = TableBuilder::new();
    let name = fbb.create_string("conv1/kernel");
    let shape = fbb.create_vector(&[3i64, 3, 64, 128]);
    let control_deps = fbb.create_vector_of_strings(&["init_op"]);
    let output_of_op = fbb.create_string("conv1/kernel/read");
    let root = UiVariable::create(
        &mut fbb,
        &UiVariableArgs {
            name: Some(name),
            type_: VarType::ARRAY,
            datatype: DType::HALF,
            shape: Some(shape),
            control_deps: Some(control_deps),
            output_of_op: Some(output_of_op),
            ..Default::default()
        },
    );
    fbb.finish(root);
    fbb.finished_data().to_vec()
}

#[test]
fn identical_bytes() {
    assert_eq!(conv1_kernel(), reference_conv1_kernel());
}

#[test]
fn reads_reference_buffer() {
    let buf = reference_conv1_kernel();
    let var = root_as_ui_variable(&buf).unwrap();
    assert_eq!(var.name(), Some("conv1/kernel"));
    assert_eq!(var.type_(), VarType::ARRAY);
    assert_eq!(var.datatype(), DType::HALF);
    assert_eq!(
        var.shape().unwrap().iter().collect::<Vec<_>>(),
        vec![3, 3, 64, 128]
    );
    assert_eq!(
        var.control_deps().unwrap().iter().collect::<Vec<_>>(),
        vec!["init_op"]
    );
    assert_eq!(var.output_of_op(), Some("conv1/kernel/read"));
    assert!(var.gradient_variable().is_none());
    assert!(var.constant_value().is_none());
}

#[test]
fn shared_vtables_match() {
    let pairs = [(1, 2), (3, 4), (0, 5)];

    let mut reference = FlatBufferBuilder::new();
    let offsets = pairs
        .iter()
        .map(|(first, second)| {
            let start = reference.start_table();
            reference.push_slot::<i32>(IntPair::VT_SECOND.voffset(), *second, 0);
            reference.push_slot::<i32>(IntPair::VT_FIRST.voffset(), *first, 0);
            reference.end_table(start)
        })
        .collect::<Vec<_>>();
    let items = reference.create_vector(&offsets);
    let start = reference.start_table();
    reference.push_slot_always(Slot::new(0).voffset(), items);
    let root_offset = reference.end_table(start);
    reference.finish_minimal(root_offset);

    let mut fbb = TableBuilder::new();
    let offsets = pairs
        .iter()
        .map(|(first, second)| {
            IntPair::create(
                &mut fbb,
                &IntPairArgs {
                    first: *first,
                    second: *second,
                },
            )
        })
        .collect::<Vec<_>>();
    let items = fbb.create_vector(&offsets);
    let mut table = fbb.start_table(1);
    table.push_offset(Slot::new(0), items);
    let root_offset: Offset<TableMarker> = table.finish();
    fbb.finish(root_offset);

    assert_eq!(fbb.finished_data(), reference.finished_data());

    let table = root::<Table<'_>>(reference.finished_data()).unwrap();
    let firsts = table
        .vector::<IntPair<'_>>(Slot::new(0))
        .unwrap()
        .iter()
        .map(|pair| pair.first())
        .collect::<Vec<_>>();
    assert_eq!(firsts, vec![1, 3, 0]);
}

#[test]
fn forced_defaults_match() {
    let mut reference = FlatBufferBuilder::new();
    reference.force_defaults(true);
    let start = reference.start_table();
    reference.push_slot::<i8>(UiVariable::VT_DATATYPE.voffset(), 0, 0);
    reference.push_slot::<i8>(UiVariable::VT_TYPE.voffset(), 0, 0);
    let root = reference.end_table(start);
    reference.finish_minimal(root);

    let mut fbb = TableBuilder::with_options(BuilderOptions {
        force_defaults: true,
        ..Default::default()
    });
    let root = UiVariable::create(&mut fbb, &UiVariableArgs::default());
    fbb.finish(root);

    assert_eq!(fbb.finished_data(), reference.finished_data());
}

#[test]
fn identifier_and_size_prefix_match() {
    let mut reference = FlatBufferBuilder::new();
    let name = reference.create_string("w");
    let start = reference.start_table();
    reference.push_slot_always(UiVariable::VT_NAME.voffset(), name);
    let root = reference.end_table(start);
    reference.finish_size_prefixed(root, Some("UIGV"));

    let mut fbb = TableBuilder::new();
    let name = fbb.create_string("w");
    let root = UiVariable::create(
        &mut fbb,
        &UiVariableArgs {
            name: Some(name),
            ..Default::default()
        },
    );
    fbb.finish_size_prefixed(root, Some(b"UIGV"));

    assert_eq!(fbb.finished_data(), reference.finished_data());
}
