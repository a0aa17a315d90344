use image2text_io::{ImageSize, NormalizedImage};
use image2text_vlm::{Conversation, GenerationBackend, SamplingParameters, VlmError};

/// Echoes the conversation layout, padding it with whitespace like a chatty model.
struct Padded;

impl GenerationBackend for Padded {
    fn generate(
        &mut self,
        conversation: &Conversation,
        params: &SamplingParameters,
    ) -> Result<String, VlmError> {
        let mode = if params.is_deterministic() {
            "greedy"
        } else {
            "sampled"
        };
        Ok(format!(
            "\n  {} image(s), {mode}, {} max \t\n",
            conversation.images().count(),
            params.max_new_tokens()
        ))
    }
}

fn image() -> NormalizedImage {
    NormalizedImage::new(
        ImageSize {
            width: 1,
            height: 1,
        },
        vec![0, 0, 0],
        None,
    )
    .unwrap()
}

#[test]
fn run_trims_model_output() -> Result<(), VlmError> {
    let conversation = Conversation::build(vec![image(), image()], None);
    let params = SamplingParameters::new(64, 0.0)?;

    let mut backend = Padded;
    assert_eq!(
        backend.generate(&conversation, &params)?,
        "\n  2 image(s), greedy, 64 max \t\n"
    );
    assert_eq!(backend.run(&conversation, &params)?, "2 image(s), greedy, 64 max");
    Ok(())
}

#[test]
fn boxed_backends_keep_the_contract() -> Result<(), VlmError> {
    let conversation = Conversation::build(vec![image()], Some("hi"));
    let mut backend: Box<dyn GenerationBackend> = Box::new(Padded);
    let first = backend.run(&conversation, &SamplingParameters::greedy(8)?)?;
    let second = backend.run(&conversation, &SamplingParameters::greedy(8)?)?;
    assert_eq!(first, second);
    assert_eq!(first, "1 image(s), greedy, 8 max");
    Ok(())
}
