use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_transformers::generation::{LogitsProcessor, Sampling};
use candle_transformers::models::paligemma::Model;
use log::debug;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokenizers::Tokenizer;

use crate::{error::VlmError, sampling::SamplingParameters};

/// Maps sampling parameters to the candle sampling strategy.
pub(crate) fn sampling_for(params: &SamplingParameters) -> Sampling {
    if params.is_deterministic() {
        Sampling::ArgMax
    } else {
        Sampling::All {
            temperature: params.temperature(),
        }
    }
}

/// Hands out one logits processor per call, seeded from a generator that advances
/// across calls.
pub(crate) struct Sampler {
    rng: StdRng,
}

impl Sampler {
    pub(crate) fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub(crate) fn processor(&mut self, params: &SamplingParameters) -> LogitsProcessor {
        let sampling = sampling_for(params);
        // greedy decoding never draws, keep the sequence for sampled calls
        let seed = match sampling {
            Sampling::ArgMax => 0,
            _ => self.rng.random(),
        };
        LogitsProcessor::from_sampling(seed, sampling)
    }
}

pub struct TextGenerationConfig {
    pub seed: u64,
    pub repeat_penalty: f32,
    pub repeat_last_n: usize,
}

/// The autoregressive decoding loop around the PaliGemma model.
pub struct TextGeneration {
    model: Model,
    device: Device,
    tokenizer: Tokenizer,
    eos_token: u32,
    config: TextGenerationConfig,
    sampler: Sampler,
}

impl TextGeneration {
    pub fn new(
        model: Model,
        tokenizer: Tokenizer,
        device: Device,
        config: TextGenerationConfig,
    ) -> Result<Self, VlmError> {
        let eos_token = tokenizer
            .token_to_id("<eos>")
            .ok_or(VlmError::EosTokenNotFound)?;
        Ok(Self {
            model,
            device,
            tokenizer,
            eos_token,
            sampler: Sampler::new(config.seed),
            config,
        })
    }

    #[inline]
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Generate the answer to `prompt` about `image`, returning only the new text.
    pub fn run(
        &mut self,
        image: &Tensor,
        prompt: &str,
        params: &SamplingParameters,
    ) -> Result<String, VlmError> {
        // every call starts from an empty context
        self.model.clear_kv_cache();
        let mut logits_processor = self.sampler.processor(params);

        let mut tokens = self.tokenizer.encode(prompt, true)?.get_ids().to_vec();
        let prompt_len = tokens.len();

        let start_gen = Instant::now();
        for index in 0..params.max_new_tokens() {
            let context_size = if index > 0 { 1 } else { tokens.len() };
            let start_pos = tokens.len().saturating_sub(context_size);
            let input = Tensor::new(&tokens[start_pos..], &self.device)?.unsqueeze(0)?;
            let logits = if index > 0 {
                self.model.forward(&input)?
            } else {
                self.model.setup(image, &input)?
            };
            let logits = logits.squeeze(0)?.squeeze(0)?.to_dtype(DType::F32)?;
            let logits = if self.config.repeat_penalty == 1. {
                logits
            } else {
                let start_at = tokens.len().saturating_sub(self.config.repeat_last_n);
                candle_transformers::utils::apply_repeat_penalty(
                    &logits,
                    self.config.repeat_penalty,
                    &tokens[start_at..],
                )?
            };

            let next_token = logits_processor.sample(&logits)?;
            if next_token == self.eos_token {
                break;
            }
            tokens.push(next_token);
        }

        let generated = &tokens[prompt_len..];
        let dt = start_gen.elapsed();
        debug!(
            "{} tokens generated ({:.2} token/s)",
            generated.len(),
            generated.len() as f64 / dt.as_secs_f64(),
        );

        Ok(self.tokenizer.decode(generated, true)?)
    }
}

#[cfg(test)]
mod tests {
    use candle_core::{Device, Tensor};
    use candle_transformers::generation::Sampling;

    use super::{sampling_for, Sampler};
    use crate::sampling::SamplingParameters;

    fn draw(sampler: &mut Sampler, params: &SamplingParameters) -> candle_core::Result<Vec<u32>> {
        let logits = Tensor::zeros(1000, candle_core::DType::F32, &Device::Cpu)?;
        let mut processor = sampler.processor(params);
        (0..8).map(|_| processor.sample(&logits)).collect()
    }

    #[test]
    fn temperature_selects_the_strategy() -> Result<(), crate::error::VlmError> {
        assert!(matches!(
            sampling_for(&SamplingParameters::new(16, 0.0)?),
            Sampling::ArgMax
        ));
        assert!(matches!(
            sampling_for(&SamplingParameters::new(16, 0.7)?),
            Sampling::All { temperature } if temperature == 0.7
        ));
        Ok(())
    }

    #[test]
    fn sampled_calls_do_not_repeat() -> Result<(), Box<dyn std::error::Error>> {
        let params = SamplingParameters::new(16, 1.0)?;
        let mut sampler = Sampler::new(299792458);
        let first = draw(&mut sampler, &params)?;
        let second = draw(&mut sampler, &params)?;
        assert_ne!(first, second);

        let mut replay = Sampler::new(299792458);
        assert_eq!(draw(&mut replay, &params)?, first);
        Ok(())
    }

    #[test]
    fn greedy_calls_repeat() -> Result<(), Box<dyn std::error::Error>> {
        let params = SamplingParameters::greedy(16)?;
        let mut sampler = Sampler::new(1);
        assert_eq!(draw(&mut sampler, &params)?, draw(&mut sampler, &params)?);
        Ok(())
    }
}
