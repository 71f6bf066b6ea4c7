use crate::inst::{IrInst, IrOp};

fn pool(constants: &[u32], idx: u8) -> String {
    match constants.get(idx as usize) {
        Some(v) => format!("{v:#010x}"),
        None => format!("<bad pool index {idx}>"),
    }
}

/// Render one IR instruction as a human-readable line.
///
/// Used by the block-dump diagnostics; the output format is not stable.
pub fn disassemble(inst: &IrInst, constants: &[u32]) -> String {
    let IrInst {
        op,
        dest,
        src1,
        src2,
    } = *inst;
    match op {
        IrOp::Nop => "Nop".to_string(),
        IrOp::SetConst => format!("SetConst r{dest}, {}", pool(constants, src1)),
        IrOp::Mov => format!("Mov r{dest}, r{src1}"),
        IrOp::Add => format!("Add r{dest}, r{src1}, r{src2}"),
        IrOp::Sub => format!("Sub r{dest}, r{src1}, r{src2}"),
        IrOp::And => format!("And r{dest}, r{src1}, r{src2}"),
        IrOp::Or => format!("Or r{dest}, r{src1}, r{src2}"),
        IrOp::Xor => format!("Xor r{dest}, r{src1}, r{src2}"),
        IrOp::AddConst => format!("AddConst r{dest}, r{src1}, {}", pool(constants, src2)),
        IrOp::AndConst => format!("AndConst r{dest}, r{src1}, {}", pool(constants, src2)),
        IrOp::OrConst => format!("OrConst r{dest}, r{src1}, {}", pool(constants, src2)),
        IrOp::XorConst => format!("XorConst r{dest}, r{src1}, {}", pool(constants, src2)),
        IrOp::SltConst => format!("SltConst r{dest}, r{src1}, {}", pool(constants, src2)),
        IrOp::SetVfpuCtrl => format!("SetVfpuCtrl ctrl{dest}, {}", pool(constants, src1)),
        IrOp::RestoreRoundingMode => "RestoreRoundingMode".to_string(),
        IrOp::ApplyRoundingMode => "ApplyRoundingMode".to_string(),
        IrOp::UpdateRoundingMode => "UpdateRoundingMode".to_string(),
        IrOp::Interpret => format!("Interpret {}", pool(constants, src1)),
        IrOp::Syscall => format!("Syscall {}", pool(constants, src1)),
        IrOp::Downcount => format!("Downcount {}", pool(constants, src1)),
        IrOp::ExitToConst => format!("ExitToConst {}", pool(constants, src1)),
        IrOp::ExitToReg => format!("ExitToReg r{src1}"),
        IrOp::ExitToConstIfEq => format!(
            "ExitToConstIfEq {}, r{src1}, r{src2}",
            pool(constants, dest)
        ),
        IrOp::ExitToConstIfNeq => format!(
            "ExitToConstIfNeq {}, r{src1}, r{src2}",
            pool(constants, dest)
        ),
        IrOp::ExitToConstIfLtZ => format!("ExitToConstIfLtZ {}, r{src1}", pool(constants, dest)),
        IrOp::ExitToConstIfLeZ => format!("ExitToConstIfLeZ {}, r{src1}", pool(constants, dest)),
        IrOp::ExitToConstIfGtZ => format!("ExitToConstIfGtZ {}, r{src1}", pool(constants, dest)),
        IrOp::ExitToConstIfGeZ => format!("ExitToConstIfGeZ {}, r{src1}", pool(constants, dest)),
        IrOp::Breakpoint => "Breakpoint".to_string(),
    }
}
