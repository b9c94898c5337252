//! Renders a [`ParameterArtifact`] as a C header/source pair of `mzd_local_t`
//! initialisers, the `lowmc_round_t` table and the `lowmc_t` descriptor.

use core::fmt::Write;

use crate::artifact::{constant_name, key_matrix_name, ParameterArtifact, ReducedRefs};
use crate::pack::PackedMatrix;

const TYPENAME: &str = "mzd_local_t";

/// File stem `lowmc_{n}_{k}_{r}` shared by the header, source and descriptor symbol.
pub fn stem(artifact: &ParameterArtifact) -> String {
    format!("lowmc_{}", artifact.params().tag())
}

/// Renders the header declaring the descriptor.
pub fn render_header(artifact: &ParameterArtifact) -> String {
    let stem = stem(artifact);
    let guard = stem.to_uppercase();
    format!(
        "#ifndef {guard}_H\n\
         #define {guard}_H\n\
         \n\
         #include \"lowmc_pars.h\"\n\
         \n\
         #if !defined(MUL_M4RI)\n\
         extern const lowmc_t {stem};\n\
         #else\n\
         extern lowmc_t {stem};\n\
         #endif\n\
         \n\
         #endif\n"
    )
}

/// Renders the source defining every object, the round table and the descriptor.
pub fn render_source(artifact: &ParameterArtifact) -> String {
    let stem = stem(artifact);
    let d = &artifact.descriptor;
    let mut out = String::new();

    out.push_str("#ifdef HAVE_CONFIG_H\n#include <config.h>\n#endif\n\n#include <stddef.h>\n\n");
    let _ = writeln!(out, "#include \"{stem}.h\"\n");

    let reduced = d.reduced.as_ref();
    for round in artifact.round_objects() {
        let layer = round.linear_layer;
        write_matrix(&mut out, &layer.name, &layer.matrix);
        out.push('\n');
    }

    if reduced.is_some() {
        out.push_str("#if !defined(REDUCED_LINEAR_LAYER)");
    }
    for i in 0..=d.rounds {
        let name = key_matrix_name(i);
        if let Some(m) = artifact.object(&name) {
            out.push('\n');
            write_matrix(&mut out, &name, m);
        }
    }
    for i in 0..d.rounds {
        let name = constant_name(i);
        if let Some(m) = artifact.object(&name) {
            out.push('\n');
            write_matrix(&mut out, &name, m);
        }
    }
    if let Some(refs) = reduced {
        out.push_str("#endif\n");
        out.push_str("#if defined(REDUCED_LINEAR_LAYER)\n");
        for name in [
            &refs.linear_key_matrix,
            &refs.non_linear_key_matrix,
            &refs.linear_constant,
            &refs.non_linear_constant,
        ] {
            if let Some(m) = artifact.object(name) {
                write_matrix(&mut out, name, m);
                out.push('\n');
            }
        }
        out.push_str("#endif\n\n");
    } else {
        out.push('\n');
    }

    write_round_table(&mut out, artifact, reduced.is_some());
    write_descriptor(&mut out, artifact, &stem, reduced);
    out
}

fn write_matrix(out: &mut String, name: &str, m: &PackedMatrix) {
    let digits = m.width().bits() / 4;
    let bits = m.width().bits();
    let _ = writeln!(
        out,
        "static const {TYPENAME} {name} = {{ {}, {}, {}, {}, {{ 0 }}, {{",
        m.rows(),
        m.cols(),
        m.words_per_row(),
        m.row_stride()
    );
    for row in 0..m.rows() {
        let words: Vec<String> = m
            .row(row)
            .iter()
            .map(|w| format!("UINT{bits}_C(0x{w:0digits$x})"))
            .collect();
        let _ = writeln!(out, "  {},", words.join(", "));
    }
    out.push_str("}};\n");
}

fn write_round_table(out: &mut String, artifact: &ParameterArtifact, reduced: bool) {
    let rounds = artifact.descriptor.rounds;
    let _ = write!(
        out,
        "#if defined(MUL_M4RI)\n\
         static lowmc_round_t rounds[{rounds}] = {{\n\
         #else\n\
         static const lowmc_round_t rounds[{rounds}] = {{\n\
         #endif\n"
    );
    for round in artifact.round_objects() {
        let (k, l, c) = (
            &round.key_matrix.name,
            &round.linear_layer.name,
            &round.constant.name,
        );
        if reduced {
            let _ = write!(
                out,
                "\n  {{\n\
                 #if !defined(REDUCED_LINEAR_LAYER)\n\
                 #if defined(MUL_M4RI)\n    &{k}, &{l}, &{c}, NULL, NULL\n\
                 #else\n    &{k}, &{l}, &{c}\n#endif\n\
                 #else\n\
                 #if defined(MUL_M4RI)\n    &{l}, NULL\n\
                 #else\n    &{l}\n#endif\n\
                 #endif\n  }},"
            );
        } else {
            let _ = write!(
                out,
                "\n  {{\n\
                 #if defined(MUL_M4RI)\n    &{k}, &{l}, &{c}, NULL, NULL\n\
                 #else\n    &{k}, &{l}, &{c}\n#endif\n  }},"
            );
        }
    }
    out.push_str("\n};\n\n");
}

fn write_descriptor(
    out: &mut String,
    artifact: &ParameterArtifact,
    stem: &str,
    reduced: Option<&ReducedRefs>,
) {
    let d = &artifact.descriptor;
    let _ = writeln!(
        out,
        "#if defined(MUL_M4RI)\nlowmc_t {stem} = {{\n#else\nconst lowmc_t {stem} = {{\n#endif"
    );
    let _ = writeln!(
        out,
        "  {}, {}, {}, {},",
        d.sbox_count, d.block_size, d.rounds, d.key_size
    );
    match reduced {
        Some(refs) => {
            let _ = writeln!(
                out,
                "#if defined(REDUCED_LINEAR_LAYER)\n  &{},\n#else\n  &{},\n#endif",
                refs.linear_key_matrix, d.key_matrix
            );
        }
        None => {
            let _ = writeln!(out, "  &{},", d.key_matrix);
        }
    }
    out.push_str("#if defined(MUL_M4RI)\n  NULL,\n#endif\n  rounds,\n");
    if let Some(refs) = reduced {
        let _ = writeln!(
            out,
            "#if defined(REDUCED_LINEAR_LAYER)\n  &{},\n#if defined(MUL_M4RI)\n  NULL,\n#endif\n  &{},\n  &{},\n#endif",
            refs.non_linear_key_matrix, refs.linear_constant, refs.non_linear_constant
        );
    }
    out.push_str("#if defined(WITH_CUSTOM_INSTANCES)\n  { NULL, NULL, NULL, NULL },\n  false\n#endif\n};\n");
}
