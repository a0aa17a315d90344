use std::{
    io::Cursor,
    sync::{Arc, Mutex},
};

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use image2text::{
    io::ImageSource,
    vlm::{
        BackendIdentity, BackendLoader, Conversation, DeviceSelector, GenerationBackend,
        SamplingParameters, VlmError,
    },
    AppConfig, ErrorKind, GenerationRequest, Image2TextError, InferenceService, ResultPersister,
};

#[derive(Debug, Clone, PartialEq)]
struct Call {
    model: String,
    parts: Vec<String>,
    max_new_tokens: usize,
    temperature: f64,
}

#[derive(Default)]
struct Journal {
    loads: Vec<BackendIdentity>,
    calls: Vec<Call>,
}

struct ScriptedBackend {
    identity: BackendIdentity,
    journal: Arc<Mutex<Journal>>,
}

impl GenerationBackend for ScriptedBackend {
    fn generate(
        &mut self,
        conversation: &Conversation,
        params: &SamplingParameters,
    ) -> Result<String, VlmError> {
        let parts = conversation
            .parts()
            .iter()
            .map(|part| match (part.as_text(), part.as_image()) {
                (Some(text), _) => format!("text({text})"),
                (_, Some(image)) => format!("image({})", image.name().unwrap_or("?")),
                _ => unreachable!(),
            })
            .collect();
        self.journal.lock().unwrap().calls.push(Call {
            model: self.identity.model().to_string(),
            parts,
            max_new_tokens: params.max_new_tokens(),
            temperature: params.temperature(),
        });

        match conversation.text().as_deref() {
            Some("explode") => Err(VlmError::Backend("out of memory".into())),
            Some("panic") => panic!("backend crashed"),
            _ => Ok(format!(
                "  A description of {} image(s).\n",
                conversation.images().count()
            )),
        }
    }
}

#[derive(Clone, Default)]
struct ScriptedLoader {
    journal: Arc<Mutex<Journal>>,
}

impl BackendLoader for ScriptedLoader {
    type Backend = ScriptedBackend;

    fn load(&self, identity: &BackendIdentity) -> Result<ScriptedBackend, VlmError> {
        if identity.model().as_str() == "nobody/nothing" {
            return Err(VlmError::UnsupportedModel(identity.model().to_string()));
        }
        self.journal.lock().unwrap().loads.push(identity.clone());
        Ok(ScriptedBackend {
            identity: identity.clone(),
            journal: self.journal.clone(),
        })
    }
}

fn png(color: [u8; 3]) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb(color)))
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn service() -> (InferenceService<ScriptedLoader>, Arc<Mutex<Journal>>) {
    let loader = ScriptedLoader::default();
    let journal = loader.journal.clone();
    let config = AppConfig::default().with_default_model("test/default-model");
    (InferenceService::new(config, loader), journal)
}

#[test]
fn empty_input_touches_no_backend() {
    let (service, journal) = service();
    let err = service
        .generate(GenerationRequest::new(Vec::new()).with_prompt(Some("hi".into())))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyInput);
    assert!(journal.lock().unwrap().loads.is_empty());
    assert!(service.backends().is_empty());
}

#[test]
fn corrupted_image_fails_the_whole_batch() {
    let (service, journal) = service();
    let request = GenerationRequest::new([
        ImageSource::bytes("good.png", png([1, 2, 3])),
        ImageSource::bytes("broken.jpg", b"\xff\xd8 garbage".to_vec()),
        ImageSource::bytes("never_read.png", png([4, 5, 6])),
    ]);

    let err = service.generate(request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidImage);
    assert_eq!(err.offending_input(), Some("broken.jpg"));
    assert_eq!(err.to_string(), "Unsupported image: broken.jpg");

    let journal = journal.lock().unwrap();
    assert!(journal.loads.is_empty());
    assert!(journal.calls.is_empty());
}

#[test]
fn compare_two_images_and_persist() -> Result<(), Box<dyn std::error::Error>> {
    let (service, journal) = service();
    let tmp_dir = tempfile::tempdir()?;
    let persister = ResultPersister::new(tmp_dir.path());

    let request = GenerationRequest::new([
        ImageSource::bytes("A.jpg", png([255, 0, 0])),
        ImageSource::bytes("B.jpg", png([0, 0, 255])),
    ])
    .with_prompt(Some("Compare these.".into()))
    .with_params(SamplingParameters::new(64, 0.0)?);

    let result = service.generate(request)?;
    assert_eq!(result.text(), "A description of 2 image(s).");
    assert_eq!(result.name_hint(), Some("A.jpg"));
    assert_eq!(result.persisted_path(), None);

    let path = persister.save(result.text(), result.name_hint())?;
    let result = result.with_persisted_path(path.clone());
    assert_eq!(path, tmp_dir.path().join("A.txt"));
    assert_eq!(result.persisted_path(), Some(path.as_path()));
    assert_eq!(result.file_name(), "A.txt");
    assert_eq!(std::fs::read_to_string(&path)?, "A description of 2 image(s).");

    let journal = journal.lock().unwrap();
    assert_eq!(
        journal.calls,
        vec![Call {
            model: "test/default-model".into(),
            parts: vec![
                "text(Compare these.)".into(),
                "image(A.jpg)".into(),
                "image(B.jpg)".into()
            ],
            max_new_tokens: 64,
            temperature: 0.0,
        }]
    );
    Ok(())
}

#[test]
fn defaults_apply_when_omitted() -> Result<(), Image2TextError> {
    let (service, journal) = service();
    let result = service.generate(GenerationRequest::new([ImageSource::anonymous_bytes(
        png([9, 9, 9]),
    )]))?;
    assert_eq!(result.name_hint(), None);
    assert_eq!(result.file_name(), "image.txt");
    assert_eq!(result.identity(), &service.default_identity());

    let journal = journal.lock().unwrap();
    assert_eq!(journal.calls[0].max_new_tokens, 256);
    assert_eq!(journal.calls[0].temperature, 0.2);
    assert_eq!(journal.calls[0].parts, vec!["image(?)".to_string()]);
    Ok(())
}

#[test]
fn backends_are_reused_per_identity() -> Result<(), Image2TextError> {
    let (service, journal) = service();
    let request = || GenerationRequest::new([ImageSource::bytes("x.png", png([0, 0, 0]))]);
    let on_cpu = service
        .default_identity()
        .with_device(Some(DeviceSelector::Cpu));

    service.generate(request())?;
    service.generate(request())?;
    service.generate(request().with_identity(on_cpu.clone()))?;
    service.generate(request().with_identity(on_cpu.clone()))?;

    let journal = journal.lock().unwrap();
    assert_eq!(journal.loads, vec![service.default_identity(), on_cpu]);
    assert_eq!(journal.calls.len(), 4);
    Ok(())
}

#[test]
fn unknown_model_is_backend_unavailable() {
    let (service, journal) = service();
    let err = service
        .generate(
            GenerationRequest::new([ImageSource::bytes("x.png", png([0, 0, 0]))])
                .with_identity(BackendIdentity::new("nobody/nothing")),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    assert!(journal.lock().unwrap().calls.is_empty());
}

#[test]
fn generation_failure_does_not_poison_later_requests() -> Result<(), Image2TextError> {
    let (service, _journal) = service();
    let request = |prompt: &str| {
        GenerationRequest::new([ImageSource::bytes("x.png", png([0, 0, 0]))])
            .with_prompt(Some(prompt.to_string()))
    };

    let err = service.generate(request("explode")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GenerationFailed);
    assert!(err.to_string().contains("out of memory"));

    let ok = service.generate(request("describe"))?;
    assert_eq!(ok.text(), "A description of 1 image(s).");
    assert_eq!(service.backends().len(), 1);
    Ok(())
}

#[test]
fn greedy_generation_is_repeatable() -> Result<(), Box<dyn std::error::Error>> {
    let (service, _journal) = service();
    let request = || {
        GenerationRequest::new([ImageSource::bytes("x.png", png([3, 3, 3]))])
            .with_params(SamplingParameters::greedy(16).unwrap())
    };
    let first = service.generate(request())?;
    let second = service.generate(request())?;
    assert_eq!(first.text(), second.text());
    Ok(())
}

#[test]
fn crashed_backend_is_replaced() -> Result<(), Image2TextError> {
    let (service, journal) = service();
    let request = |prompt: &str| {
        GenerationRequest::new([ImageSource::bytes("x.png", png([0, 0, 0]))])
            .with_prompt(Some(prompt.to_string()))
    };

    let crashed = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        service.generate(request("panic"))
    }));
    assert!(crashed.is_err());

    let err = service.generate(request("describe")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GenerationFailed);
    assert!(service.backends().is_empty());

    let ok = service.generate(request("describe"))?;
    assert_eq!(ok.text(), "A description of 1 image(s).");
    assert_eq!(journal.lock().unwrap().loads.len(), 2);
    Ok(())
}
