use crate::{
    bytecode::opcodes::{Nibble, Opcode, OpcodeEx1, OpcodeEx2, OpcodeEx3},
    format::{FieldFormat, FieldValue, FixedFormat, I16Le, IntoFieldValue, Nibbles, I8, U16Le, U8},
    output::Offset,
    region::Region,
    resolve::Resolvable,
    Result,
};

/// Emits instructions into a [`Region`].
///
/// Every instruction starts with one byte holding the primary opcode in the high nibble.
/// Relative jumps are measured from the end of the jump instruction, and the target may be
/// a marker placed later in the region.
///
/// # Examples
///
/// ```rust
/// use snapforge::bytecode::{InstructionWriter, OpcodeEx1};
/// use snapforge::{FlattenConfig, Region, Resolvable};
///
/// let mut region = Region::new();
/// let done = Resolvable::new();
/// {
///     let mut writer = InstructionWriter::new(&mut region);
///     writer.jump_8(&done)?;
///     writer.ex1(OpcodeEx1::Pop)?;
///     writer.label(&done);
///     writer.ex1(OpcodeEx1::Return)?;
/// }
///
/// // Jump1 (0x74) skips the one-byte Pop
/// let bytes = region.to_bytes(&FlattenConfig::strict())?;
/// assert_eq!(bytes, vec![0x74, 0x01, 0x67, 0x60]);
/// # Ok::<(), snapforge::Error>(())
/// ```
pub struct InstructionWriter<'a> {
    region: &'a mut Region,
}

impl<'a> InstructionWriter<'a> {
    /// Creates a writer appending to `region`.
    pub fn new(region: &'a mut Region) -> Self {
        Self { region }
    }

    /// Writes a primary opcode with its 4-bit operand.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ValueOutOfRange`] if `operand` does not fit 4 bits.
    pub fn op(&mut self, opcode: Opcode, operand: u8) -> Result<()> {
        self.region
            .write_fixed(Nibbles, (opcode.nibble(), operand), Some(opcode.name()))
    }

    /// Writes an instruction of the payload-free extended page.
    ///
    /// # Errors
    ///
    /// Propagates the encoding error of the instruction byte.
    pub fn ex1(&mut self, sub: OpcodeEx1) -> Result<()> {
        self.page(Opcode::Extended1, sub)
    }

    /// Writes an instruction of the 8-bit extended page.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ValueOutOfRange`] if a known payload exceeds `u8`.
    pub fn ex2<V: IntoFieldValue<i64>>(&mut self, sub: OpcodeEx2, payload: V) -> Result<()> {
        let payload = checked(U8, payload)?;
        self.page(Opcode::Extended2, sub)?;
        self.region.write_fixed(U8, payload, None)
    }

    /// Like [`InstructionWriter::ex2`] with a signed payload.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ValueOutOfRange`] if a known payload exceeds `i8`.
    pub fn ex2_signed<V: IntoFieldValue<i64>>(&mut self, sub: OpcodeEx2, payload: V) -> Result<()> {
        let payload = checked(I8, payload)?;
        self.page(Opcode::Extended2, sub)?;
        self.region.write_fixed(I8, payload, None)
    }

    /// Writes an instruction of the 16-bit extended page.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ValueOutOfRange`] if a known payload exceeds `u16`.
    pub fn ex3<V: IntoFieldValue<i64>>(&mut self, sub: OpcodeEx3, payload: V) -> Result<()> {
        let payload = checked(U16Le, payload)?;
        self.page(Opcode::Extended3, sub)?;
        self.region.write_fixed(U16Le, payload, None)
    }

    /// Like [`InstructionWriter::ex3`] with a signed payload.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ValueOutOfRange`] if a known payload exceeds `i16`.
    pub fn ex3_signed<V: IntoFieldValue<i64>>(&mut self, sub: OpcodeEx3, payload: V) -> Result<()> {
        let payload = checked(I16Le, payload)?;
        self.page(Opcode::Extended3, sub)?;
        self.region.write_fixed(I16Le, payload, None)
    }

    /// Places `label` at the next instruction.
    pub fn label(&mut self, label: &Resolvable<Offset>) {
        self.region.mark(label);
    }

    /// Conditional branch with a signed 8-bit offset.
    ///
    /// # Errors
    ///
    /// Fails immediately if both ends are known and out of range; otherwise the resolution
    /// that completes the offset reports it.
    pub fn branch_8(&mut self, target: &Resolvable<Offset>) -> Result<()> {
        self.relative_8(OpcodeEx2::Branch1, target)
    }

    /// Unconditional jump with a signed 8-bit offset.
    ///
    /// # Errors
    ///
    /// See [`InstructionWriter::branch_8`].
    pub fn jump_8(&mut self, target: &Resolvable<Offset>) -> Result<()> {
        self.relative_8(OpcodeEx2::Jump1, target)
    }

    /// Conditional branch with a signed 16-bit offset.
    ///
    /// # Errors
    ///
    /// See [`InstructionWriter::branch_8`].
    pub fn branch_16(&mut self, target: &Resolvable<Offset>) -> Result<()> {
        self.relative_16(OpcodeEx3::Branch2, target)
    }

    /// Unconditional jump with a signed 16-bit offset.
    ///
    /// # Errors
    ///
    /// See [`InstructionWriter::branch_8`].
    pub fn jump_16(&mut self, target: &Resolvable<Offset>) -> Result<()> {
        self.relative_16(OpcodeEx3::Jump2, target)
    }

    /// Calls short-call table entry `index` with the one-byte form.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ValueOutOfRange`] for indices above 15.
    pub fn call_short(&mut self, index: u8) -> Result<()> {
        self.op(Opcode::Call1, index)
    }

    /// Calls short-call table entry `index` with the two-byte form.
    ///
    /// # Errors
    ///
    /// Propagates the encoding error of the instruction.
    pub fn call_short_8(&mut self, index: u8) -> Result<()> {
        self.ex2(OpcodeEx2::Call2, index)
    }

    /// Calls the function at `target` with `argc` arguments.
    ///
    /// The address is written as a 16-bit literal and may be a forward reference.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ValueOutOfRange`] if a known address exceeds 16 bits.
    pub fn call_general(&mut self, target: &Resolvable<Offset>, argc: u8) -> Result<()> {
        let address = checked(U16Le, target.as_i64()?)?;
        self.ex2(OpcodeEx2::Call3, argc)?;
        self.region.write_fixed(U16Le, address, Some("call target"))
    }

    fn page<S: Nibble>(&mut self, page: Opcode, sub: S) -> Result<()> {
        self.region
            .write_fixed(Nibbles, (page.nibble(), sub.nibble()), Some(sub.name()))
    }

    fn relative_8(&mut self, sub: OpcodeEx2, target: &Resolvable<Offset>) -> Result<()> {
        let end = Resolvable::new();
        let offset = checked(I8, relative_offset(target, &end)?)?;
        self.page(Opcode::Extended2, sub)?;
        self.region.write_fixed(I8, offset, Some("relative"))?;
        self.region.mark(&end);
        Ok(())
    }

    fn relative_16(&mut self, sub: OpcodeEx3, target: &Resolvable<Offset>) -> Result<()> {
        let end = Resolvable::new();
        let offset = checked(I16Le, relative_offset(target, &end)?)?;
        self.page(Opcode::Extended3, sub)?;
        self.region.write_fixed(I16Le, offset, Some("relative"))?;
        self.region.mark(&end);
        Ok(())
    }
}

/// Range-checks a known payload so that no instruction byte is written for it on failure.
fn checked<F, V>(format: F, payload: V) -> Result<FieldValue<i64>>
where
    F: FixedFormat + FieldFormat<Value = i64>,
    V: IntoFieldValue<i64>,
{
    let payload = payload.into_field_value();
    let known = match &payload {
        FieldValue::Known(value) => Some(*value),
        FieldValue::Deferred(value) => value.value(),
    };
    if let Some(value) = known {
        format.encode(&value)?;
    }
    Ok(payload)
}

/// `target - end` as a signed value.
fn relative_offset(target: &Resolvable<Offset>, end: &Resolvable<Offset>) -> Result<Resolvable<i64>> {
    target.as_i64()?.subtract(&end.as_i64()?)
}
