use std::fmt::Display;
use std::fs::File;
use std::io::Write;

use super::def::*;

pub(crate) type Tracer = (Box<dyn Write + Send>, isize);

////////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(feature = "trace")]
pub(crate) fn OPEN_TRACE() -> Option<Tracer> {
    if let Ok(fp) = File::create("md_trace.txt") {
        Some((Box::new(fp), 0))
    } else {
        None
    }
}

#[cfg(feature = "trace")]
pub(crate) fn MD_TRACE_COUNTER(tracer: &mut Option<Tracer>) {
    if let Some((writer, counter)) = tracer {
        let _ = writer.write_fmt(format_args!("{} \t", *counter));
        *counter += 1;
    }
}

#[cfg(feature = "trace")]
pub(crate) fn MD_TRACE<T: Display>(tracer: &mut Option<Tracer>, name: T) {
    if let Some((writer, _)) = tracer {
        let _ = writer.write_fmt(format_args!("{}", name));
    }
}

#[cfg(feature = "trace_me")]
#[allow(clippy::too_many_arguments)]
pub(crate) fn TRACE_ME(
    tracer: &mut Option<Tracer>,
    x: usize,
    y: usize,
    w: usize,
    h: usize,
    rf: RefFrame,
    me_mv: MotionVector,
    pme_mv: Option<MotionVector>,
    me_dist: u64,
) {
    MD_TRACE_COUNTER(tracer);
    MD_TRACE(tracer, "me ");
    MD_TRACE(tracer, format!("({}, {}) {}x{} ref {} mv {} dist {}", x, y, w, h, rf, me_mv, me_dist));
    if let Some(p) = pme_mv {
        MD_TRACE(tracer, " pme ");
        MD_TRACE(tracer, p);
    }
    MD_TRACE(tracer, "\n");
}

#[cfg(feature = "trace_md")]
#[allow(clippy::too_many_arguments)]
pub(crate) fn TRACE_MD_STAGE(
    tracer: &mut Option<Tracer>,
    x: usize,
    y: usize,
    w: usize,
    h: usize,
    survivors: &[usize; 4],
    mode: PredictionMode,
    cost: u64,
) {
    MD_TRACE_COUNTER(tracer);
    MD_TRACE(tracer, "md ");
    MD_TRACE(
        tracer,
        format!(
            "({}, {}) {}x{} nic {}/{}/{}/{} mode {:?} cost {}\n",
            x, y, w, h, survivors[0], survivors[1], survivors[2], survivors[3], mode, cost
        ),
    );
}

#[cfg(feature = "trace_pd")]
pub(crate) fn TRACE_PD(
    tracer: &mut Option<Tracer>,
    x: usize,
    y: usize,
    size: usize,
    shape: PartitionShape,
    cost: u64,
) {
    MD_TRACE_COUNTER(tracer);
    MD_TRACE(tracer, "pd ");
    MD_TRACE(tracer, format!("({}, {}) {} {} cost {}\n", x, y, size, shape, cost));
}

////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(not(feature = "trace"))]
pub(crate) fn OPEN_TRACE() -> Option<Tracer> {
    None
}

#[cfg(not(feature = "trace"))]
pub(crate) fn MD_TRACE_COUNTER(tracer: &mut Option<Tracer>) {}

#[cfg(not(feature = "trace"))]
pub(crate) fn MD_TRACE<T: Display>(tracer: &mut Option<Tracer>, name: T) {}

#[cfg(not(feature = "trace_me"))]
#[allow(clippy::too_many_arguments)]
pub(crate) fn TRACE_ME(
    tracer: &mut Option<Tracer>,
    x: usize,
    y: usize,
    w: usize,
    h: usize,
    rf: RefFrame,
    me_mv: MotionVector,
    pme_mv: Option<MotionVector>,
    me_dist: u64,
) {
}

#[cfg(not(feature = "trace_md"))]
#[allow(clippy::too_many_arguments)]
pub(crate) fn TRACE_MD_STAGE(
    tracer: &mut Option<Tracer>,
    x: usize,
    y: usize,
    w: usize,
    h: usize,
    survivors: &[usize; 4],
    mode: PredictionMode,
    cost: u64,
) {
}

#[cfg(not(feature = "trace_pd"))]
pub(crate) fn TRACE_PD(
    tracer: &mut Option<Tracer>,
    x: usize,
    y: usize,
    size: usize,
    shape: PartitionShape,
    cost: u64,
) {
}
