use uigraph_buffer::ByteBuffer;
use uigraph_error::UiGraphError;
use uigraph_flatbuffers::{
    FlatBufferRoot, Follow, Offset, ReadFlatBuffer, TableBuilder, Vector, WriteFlatBuffer,
};

use crate::flatbuffers as fb;
use crate::{FlatArray, IntPair, UiVariable};

impl WriteFlatBuffer for IntPair {
    type Target = fb::IntPairOffset;

    fn write_flatbuffer(&self, fbb: &mut TableBuilder) -> Offset<Self::Target> {
        fb::IntPair::create(
            fbb,
            &fb::IntPairArgs {
                first: self.first,
                second: self.second,
            },
        )
    }
}

impl ReadFlatBuffer for IntPair {
    type Source<'a> = fb::IntPair<'a>;
    type Error = UiGraphError;

    fn read_flatbuffer<'buf>(
        fb: &<Self::Source<'buf> as Follow<'buf>>::Inner,
    ) -> Result<Self, Self::Error> {
        Ok(Self::new(fb.first(), fb.second()))
    }
}

impl WriteFlatBuffer for FlatArray {
    type Target = fb::FlatArrayOffset;

    fn write_flatbuffer(&self, fbb: &mut TableBuilder) -> Offset<Self::Target> {
        let shape = (!self.shape.is_empty()).then(|| fbb.create_vector(&self.shape));
        let buffer = (!self.buffer.is_empty()).then(|| fbb.create_byte_vector(&self.buffer));
        fb::FlatArray::create(
            fbb,
            &fb::FlatArrayArgs {
                shape,
                buffer,
                dtype: self.dtype.into(),
                byte_order: self.byte_order.into(),
            },
        )
    }
}

impl ReadFlatBuffer for FlatArray {
    type Source<'a> = fb::FlatArray<'a>;
    type Error = UiGraphError;

    fn read_flatbuffer<'buf>(
        fb: &<Self::Source<'buf> as Follow<'buf>>::Inner,
    ) -> Result<Self, Self::Error> {
        let array = Self {
            shape: fb.shape().map(|v| v.iter().collect()).unwrap_or_default(),
            buffer: fb
                .buffer_bytes()
                .map(ByteBuffer::copy_from)
                .unwrap_or_default(),
            dtype: fb.dtype().into(),
            byte_order: fb.byte_order().into(),
        };
        if !array.is_consistent() {
            log::warn!(
                "array of {} bytes does not match its shape of rank {} and dtype {}",
                array.buffer.len(),
                array.shape.len(),
                i8::from(array.dtype)
            );
        }
        Ok(array)
    }
}

impl FlatBufferRoot for UiVariable {}

impl WriteFlatBuffer for UiVariable {
    type Target = fb::UiVariableOffset;

    fn write_flatbuffer(&self, fbb: &mut TableBuilder) -> Offset<Self::Target> {
        let id = self.id.map(|id| id.write_flatbuffer(fbb));
        let name = self.name.as_deref().map(|s| fbb.create_string(s));
        let shape = (!self.shape.is_empty()).then(|| fbb.create_vector(&self.shape));
        let control_deps = write_strings(fbb, &self.control_deps);
        let output_of_op = self.output_of_op.as_deref().map(|s| fbb.create_string(s));
        let inputs_for_op = write_strings(fbb, &self.inputs_for_op);
        let control_deps_for_op = write_strings(fbb, &self.control_deps_for_op);
        let control_deps_for_var = write_strings(fbb, &self.control_deps_for_var);
        let gradient_variable = self
            .gradient_variable
            .as_deref()
            .map(|s| fbb.create_string(s));
        let ui_label_extra = self.ui_label_extra.as_deref().map(|s| fbb.create_string(s));
        let constant_value = self
            .constant_value
            .as_ref()
            .map(|array| array.write_flatbuffer(fbb));

        fb::UiVariable::create(
            fbb,
            &fb::UiVariableArgs {
                id,
                name,
                type_: self.var_type.into(),
                datatype: self.datatype.into(),
                shape,
                control_deps,
                output_of_op,
                inputs_for_op,
                control_deps_for_op,
                control_deps_for_var,
                gradient_variable,
                ui_label_extra,
                constant_value,
            },
        )
    }
}

impl ReadFlatBuffer for UiVariable {
    type Source<'a> = fb::UiVariable<'a>;
    type Error = UiGraphError;

    fn read_flatbuffer<'buf>(
        fb: &<Self::Source<'buf> as Follow<'buf>>::Inner,
    ) -> Result<Self, Self::Error> {
        Ok(Self {
            id: fb
                .id()
                .map(|id| IntPair::read_flatbuffer(&id))
                .transpose()?,
            name: fb.name().map(str::to_owned),
            var_type: fb.type_().into(),
            datatype: fb.datatype().into(),
            shape: fb.shape().map(|v| v.iter().collect()).unwrap_or_default(),
            control_deps: read_strings(fb.control_deps()),
            output_of_op: fb.output_of_op().map(str::to_owned),
            inputs_for_op: read_strings(fb.inputs_for_op()),
            control_deps_for_op: read_strings(fb.control_deps_for_op()),
            control_deps_for_var: read_strings(fb.control_deps_for_var()),
            gradient_variable: fb.gradient_variable().map(str::to_owned),
            ui_label_extra: fb.ui_label_extra().map(str::to_owned),
            constant_value: fb
                .constant_value()
                .map(|array| FlatArray::read_flatbuffer(&array))
                .transpose()?,
        })
    }
}

fn write_strings(fbb: &mut TableBuilder, items: &[String]) -> Option<Offset<[Offset<str>]>> {
    (!items.is_empty()).then(|| fbb.create_vector_of_strings(items))
}

fn read_strings(strings: Option<Vector<'_, &str>>) -> Vec<String> {
    strings
        .map(|v| v.iter().map(str::to_owned).collect())
        .unwrap_or_default()
}
