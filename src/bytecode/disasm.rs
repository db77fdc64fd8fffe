//! Human-readable listing of function packages

use crate::prelude::*;

use super::op::{MethodKind, Op};
use super::package::{Constant, FunctionPackage};

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        match self {
            Op::PushBool(b) => write!(f, "{} {}", name, b),
            Op::PushInt(n) => write!(f, "{} {}", name, n),
            Op::LoadValue(slot)
            | Op::StoreValue(slot)
            | Op::LoadInt(slot)
            | Op::StoreInt(slot)
            | Op::InitializeLexical(slot) => write!(f, "{} r{}", name, slot),
            Op::IncInt { slot, delta } => write!(f, "{} r{}, {}", name, slot, delta),
            Op::CreateRestArray(start) | Op::StoreArrayIndexed(start) => {
                write!(f, "{} {}", name, start)
            }
            Op::Binary(op) => write!(f, "{} {}", name, op.symbol()),
            Op::Unary(op) => write!(f, "{} {:?}", name, op),
            Op::PushConst(idx)
            | Op::GetNamed(idx)
            | Op::SetNamed(idx)
            | Op::DefineField(idx)
            | Op::CreateClosure(idx)
            | Op::DeclareGlobalVar(idx)
            | Op::InitializeGlobalLexical(idx)
            | Op::LoadGlobal(idx)
            | Op::StoreGlobal(idx)
            | Op::TypeofGlobal(idx)
            | Op::LoadVariable(idx)
            | Op::StoreVariable(idx)
            | Op::LoadModuleVar(idx)
            | Op::StoreModuleVar(idx)
            | Op::CreateImportBinding(idx)
            | Op::PushDeclarativeEnv(idx)
            | Op::PushModuleEnv(idx)
            | Op::ThrowConstantReassignment(idx)
            | Op::ThrowLexicalAccessError(idx)
            | Op::LoadSuperProperty(idx) => write!(f, "{} #{}", name, idx),
            Op::DeclareGlobalLexical { name: idx, mutable } => {
                write!(f, "{} #{}{}", name, idx, if *mutable { "" } else { " const" })
            }
            Op::Call(argc) | Op::Construct(argc) => write!(f, "{} {}", name, argc),
            Op::LoadLexical { slot, distance } | Op::StoreLexical { slot, distance } => {
                write!(f, "{} {}^{}", name, slot, distance)
            }
            Op::SetGeneratorPhase(phase) => write!(f, "{} {}", name, phase),
            Op::CreateClass {
                constructor,
                has_heritage,
            } => write!(
                f,
                "{} #{}{}",
                name,
                constructor,
                if *has_heritage { " extends" } else { "" }
            ),
            Op::AttachClassMethod {
                name: idx,
                kind,
                is_static,
            } => {
                let kind = match kind {
                    MethodKind::Method => "method",
                    MethodKind::Getter => "get",
                    MethodKind::Setter => "set",
                };
                let placement = if *is_static { " static" } else { "" };
                write!(f, "{} #{} {}{}", name, idx, kind, placement)
            }
            Op::Jump(target) => write!(f, "{} {}", name, target),
            Op::JumpIf { if_true, if_false } => write!(f, "{} {}, {}", name, if_true, if_false),
            Op::JumpIfNullish {
                if_nullish,
                otherwise,
            } => write!(f, "{} {}, {}", name, if_nullish, otherwise),
            Op::JumpTable(targets) => {
                write!(f, "{} [", name)?;
                for (i, target) in targets.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", target)?;
                }
                write!(f, "]")
            }
            _ => write!(f, "{}", name),
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Number(n) => write!(f, "number {}", crate::value::number_to_string(*n)),
            Constant::String(s) => write!(f, "string {:?}", s.as_str()),
            Constant::Function(package) => write!(
                f,
                "function {}",
                package.name().map_or("<anonymous>", |n| n.as_str())
            ),
            Constant::Scope(layout) => {
                write!(f, "scope [")?;
                for (i, binding) in layout.bindings.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    let keyword = if binding.mutable { "let" } else { "const" };
                    write!(f, "{} {}", keyword, binding.name)?;
                }
                write!(f, "]")
            }
            Constant::Import(entry) => write!(
                f,
                "import {{ {} as {} }} from {:?}",
                entry.import_name,
                entry.local_name,
                entry.specifier.as_str()
            ),
        }
    }
}

impl fmt::Display for FunctionPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = self.flags();
        write!(
            f,
            "function {} (params={}, locals={})",
            self.name().map_or("<anonymous>", |n| n.as_str()),
            self.param_count(),
            self.local_count()
        )?;
        for (set, label) in [
            (flags.strict, "strict"),
            (flags.generator, "generator"),
            (flags.is_async, "async"),
            (flags.arrow, "arrow"),
            (flags.method, "method"),
            (flags.derived, "derived"),
        ] {
            if set {
                write!(f, " {}", label)?;
            }
        }
        writeln!(f)?;

        if !self.constants().is_empty() {
            writeln!(f, "  constants:")?;
            for (i, constant) in self.constants().iter().enumerate() {
                writeln!(f, "    #{} = {}", i, constant)?;
            }
        }

        for region in self.regions() {
            writeln!(
                f,
                "  try [{:04}, {:04}) -> {}",
                region.start, region.end, region.handler
            )?;
        }

        for block in self.blocks() {
            match block.handler {
                Some(handler) => writeln!(f, "  {}: (handler {})", block.id, handler)?,
                None => writeln!(f, "  {}:", block.id)?,
            }
            for (offset, op) in self.code().iter().enumerate().skip(block.start).take(block.end - block.start) {
                writeln!(f, "    {:04} {}", offset, op)?;
            }
        }
        Ok(())
    }
}
