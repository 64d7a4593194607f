use crate::config::PipelineOptions;
use crate::error::{PipelineDiagnostics, PipelineError};
use std::marker::PhantomData;
use tracing::debug_span;

pub trait PipelineStage: Send + Sync {
    type SrcCtx;
    type DstCtx;

    fn name(&self) -> &'static str;

    fn run(
        &self,
        context: Self::SrcCtx,
        options: &PipelineOptions,
        diagnostics: &mut PipelineDiagnostics,
    ) -> Result<Self::DstCtx, PipelineError>;
}

type RunFn<Src, Dst> = dyn Fn(Src, &mut PipelineDiagnostics, &PipelineOptions) -> Result<Dst, PipelineError>
    + Send
    + Sync;

/// Stages composed into a single callable, in the order they were added.
pub struct Pipeline<Src, Dst> {
    stages: Vec<&'static str>,
    run: Box<RunFn<Src, Dst>>,
}

impl<Src, Dst> Pipeline<Src, Dst> {
    pub fn run(
        &self,
        context: Src,
        diagnostics: &mut PipelineDiagnostics,
        options: &PipelineOptions,
    ) -> Result<Dst, PipelineError> {
        (self.run)(context, diagnostics, options)
    }

    pub fn stage_names(&self) -> &[&'static str] {
        &self.stages
    }
}

pub struct PipelineBuilder<Src, Dst> {
    pipeline: Pipeline<Src, Dst>,
    _marker: PhantomData<(Src, Dst)>,
}

impl<Src> PipelineBuilder<Src, Src> {
    pub fn new() -> Self {
        let run = |context: Src,
                   _diagnostics: &mut PipelineDiagnostics,
                   _options: &PipelineOptions| Ok(context);
        Self {
            pipeline: Pipeline {
                stages: Vec::new(),
                run: Box::new(run),
            },
            _marker: PhantomData,
        }
    }
}

impl<Src> Default for PipelineBuilder<Src, Src> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Src, Mid> PipelineBuilder<Src, Mid> {
    pub fn add_stage<Next, S>(self, stage: S) -> PipelineBuilder<Src, Next>
    where
        S: PipelineStage<SrcCtx = Mid, DstCtx = Next> + 'static,
        Src: 'static,
        Mid: 'static,
        Next: 'static,
    {
        let name = stage.name();
        let mut stages = self.pipeline.stages;
        stages.push(name);
        let previous = self.pipeline.run;
        let run = move |context: Src,
                        diagnostics: &mut PipelineDiagnostics,
                        options: &PipelineOptions| {
            let mid = previous(context, diagnostics, options)?;
            let _span = debug_span!("stage", stage = name).entered();
            match stage.run(mid, options, diagnostics) {
                Ok(next) => {
                    diagnostics.emit_stage(name, options);
                    Ok(next)
                }
                Err(err) if err.stage == name => Err(err),
                Err(err) => Err(PipelineError::new(name, err.message)),
            }
        };
        PipelineBuilder {
            pipeline: Pipeline {
                stages,
                run: Box::new(run),
            },
            _marker: PhantomData,
        }
    }

    pub fn build(self) -> Pipeline<Src, Mid> {
        self.pipeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Append(&'static str);

    impl PipelineStage for Append {
        type SrcCtx = String;
        type DstCtx = String;

        fn name(&self) -> &'static str {
            self.0
        }

        fn run(
            &self,
            mut context: String,
            _options: &PipelineOptions,
            _diagnostics: &mut PipelineDiagnostics,
        ) -> Result<String, PipelineError> {
            if self.0 == "fail" {
                return Err(PipelineError::new("inner", "boom"));
            }
            context.push_str(self.0);
            Ok(context)
        }
    }

    #[test]
    fn stages_run_in_order() {
        let pipeline = PipelineBuilder::new()
            .add_stage(Append("a"))
            .add_stage(Append("b"))
            .build();
        let mut diagnostics = PipelineDiagnostics::default();
        let out = pipeline
            .run(String::new(), &mut diagnostics, &PipelineOptions::default())
            .unwrap();
        assert_eq!(out, "ab");
        assert_eq!(pipeline.stage_names(), &["a", "b"]);
    }

    #[test]
    fn errors_are_tagged_with_the_failing_stage() {
        let pipeline = PipelineBuilder::new()
            .add_stage(Append("a"))
            .add_stage(Append("fail"))
            .add_stage(Append("c"))
            .build();
        let mut diagnostics = PipelineDiagnostics::default();
        let err = pipeline
            .run(String::new(), &mut diagnostics, &PipelineOptions::default())
            .unwrap_err();
        assert_eq!(err.stage, "fail");
        assert_eq!(err.to_string(), "[fail] boom");
    }
}
